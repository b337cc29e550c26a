use std::sync::Arc;

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::sink::{IngestionSink, RetryPolicy, send_with_retry};

/// Per-worker delivery accounting, summed by the harness after join.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub batches: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Options shared by every worker in the pool.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub partition_field: Option<String>,
    pub max_records_per_put: usize,
    pub retry: RetryPolicy,
}

/// Spawns `num_consumers` independent workers draining the shared queue.
/// Each worker exits on its own sentinel; workers never coordinate, so
/// batches may reach the sink out of enqueue order. Within a batch, record
/// order is preserved into the sink call.
pub fn spawn_consumers<S: IngestionSink>(
    num_consumers: usize,
    queue: Receiver<Option<Batch>>,
    sink: Arc<S>,
    options: ConsumerOptions,
) -> Vec<JoinHandle<WorkerStats>> {
    (0..num_consumers)
        .map(|worker_id| {
            let queue = queue.clone();
            let sink = Arc::clone(&sink);
            let options = options.clone();
            tokio::spawn(async move { consume(worker_id, queue, sink, options).await })
        })
        .collect()
}

async fn consume<S: IngestionSink>(
    worker_id: usize,
    queue: Receiver<Option<Batch>>,
    sink: Arc<S>,
    options: ConsumerOptions,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let batch = match queue.recv().await {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(worker_id, "sentinel received, exiting");
                break;
            }
            // Channel closed with no sentinel: producer is gone, nothing
            // more will arrive.
            Err(_) => break,
        };

        stats.batches += 1;
        let mut records = Vec::with_capacity(batch.messages.len());
        for message in &batch.messages {
            match message.to_stream_record(options.partition_field.as_deref()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(worker_id, msg_id = message.msg_id, error = %e, "skipping unencodable message");
                    stats.dropped += 1;
                }
            }
        }

        for chunk in records.chunks(options.max_records_per_put.max(1)) {
            let report = send_with_retry(sink.as_ref(), chunk.to_vec(), &options.retry).await;
            stats.delivered += report.delivered as u64;
            stats.dropped += report.dropped as u64;
            if report.dropped > 0 {
                warn!(
                    worker_id,
                    start_index = batch.start_index,
                    dropped = report.dropped,
                    "dropped records after exhausting retries"
                );
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FieldMap, build_messages};
    use crate::errors::SinkError;
    use crate::sink::PutOutcome;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::batch::StreamRecord;

    /// Records everything it accepts; one call = one put.
    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<StreamRecord>>,
        call_sizes: Mutex<Vec<usize>>,
    }

    impl IngestionSink for CollectingSink {
        async fn put_records(&self, records: &[StreamRecord]) -> Result<PutOutcome, SinkError> {
            self.records.lock().unwrap().extend_from_slice(records);
            self.call_sizes.lock().unwrap().push(records.len());
            Ok(PutOutcome::default())
        }
    }

    fn options(max_records_per_put: usize) -> ConsumerOptions {
        ConsumerOptions {
            partition_field: None,
            max_records_per_put,
            retry: RetryPolicy {
                max_retries: 3,
                retry_delay: Duration::from_millis(10),
            },
        }
    }

    fn msg_ids(records: &[StreamRecord]) -> HashSet<u64> {
        records
            .iter()
            .map(|r| {
                let value: serde_json::Value = serde_json::from_slice(&r.payload).unwrap();
                value["msg_id"].as_u64().unwrap()
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn workers_deliver_every_message_and_stop_on_sentinels() {
        let (tx, rx) = async_channel::unbounded();
        let sink = Arc::new(CollectingSink::default());
        let workers = spawn_consumers(3, rx.clone(), Arc::clone(&sink), options(500));

        for batch_index in 0..5u64 {
            let start_index = batch_index * 20;
            tx.send(Some(Batch {
                start_index,
                messages: build_messages(None, start_index, 20, None),
            }))
            .await
            .unwrap();
        }
        for _ in 0..3 {
            tx.send(None).await.unwrap();
        }

        let mut total = WorkerStats::default();
        for worker in workers {
            let stats = worker.await.unwrap();
            total.batches += stats.batches;
            total.delivered += stats.delivered;
            total.dropped += stats.dropped;
        }

        assert_eq!(total.batches, 5);
        assert_eq!(total.delivered, 100);
        assert_eq!(total.dropped, 0);
        assert!(rx.is_empty());

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 100);
        assert_eq!(msg_ids(&records), (0..100).collect::<HashSet<u64>>());
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_chunked_to_the_put_limit() {
        let (tx, rx) = async_channel::unbounded();
        let sink = Arc::new(CollectingSink::default());
        let workers = spawn_consumers(1, rx, Arc::clone(&sink), options(30));

        tx.send(Some(Batch {
            start_index: 0,
            messages: build_messages(None, 0, 100, None),
        }))
        .await
        .unwrap();
        tx.send(None).await.unwrap();

        for worker in workers {
            worker.await.unwrap();
        }

        let call_sizes = sink.call_sizes.lock().unwrap();
        assert_eq!(*call_sizes, vec![30, 30, 30, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn partition_field_flows_through_to_records() {
        let (tx, rx) = async_channel::unbounded();
        let sink = Arc::new(CollectingSink::default());
        let mut opts = options(500);
        opts.partition_field = Some("sentence".to_string());
        let workers = spawn_consumers(1, rx, Arc::clone(&sink), opts);

        let records_source = vec![vec!["alpha beta".to_string()]];
        let field_map = FieldMap::from([("sentence".to_string(), 0)]);
        tx.send(Some(Batch {
            start_index: 0,
            messages: build_messages(Some(&records_source), 0, 1, Some(&field_map)),
        }))
        .await
        .unwrap();
        tx.send(None).await.unwrap();

        for worker in workers {
            worker.await.unwrap();
        }

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].partition_key, "alpha beta");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_queue_without_sentinel_still_terminates_workers() {
        let (tx, rx) = async_channel::unbounded::<Option<Batch>>();
        let sink = Arc::new(CollectingSink::default());
        let workers = spawn_consumers(2, rx, sink, options(500));

        drop(tx);
        for worker in workers {
            let stats = worker.await.unwrap();
            assert_eq!(stats.batches, 0);
        }
    }
}
