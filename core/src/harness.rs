use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::batch::FieldMap;
use crate::config::RunConfig;
use crate::consumer::{ConsumerOptions, spawn_consumers};
use crate::counter::AtomicCounter;
use crate::errors::Result;
use crate::producer::run_producer;
use crate::sink::IngestionSink;

/// Everything one run needs, constructed once and handed to the producer
/// and the consumer pool. There is no process-wide mutable state; two
/// contexts are two independent runs.
pub struct RunContext<S: IngestionSink> {
    pub config: RunConfig,
    pub records: Option<Arc<Vec<Vec<String>>>>,
    pub field_map: Option<FieldMap>,
    pub sink: Arc<S>,
}

/// Load-phase accounting. `produced` is the expected-delivery target for
/// the polling phase; `delivered + dropped` accounts for every produced
/// message once the pool has joined.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunTotals {
    pub produced: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl<S: IngestionSink> RunContext<S> {
    pub fn new(config: RunConfig, sink: Arc<S>) -> Self {
        Self {
            config,
            records: None,
            field_map: None,
            sink,
        }
    }

    pub fn with_records(mut self, records: Vec<Vec<String>>, field_map: FieldMap) -> Self {
        self.records = Some(Arc::new(records));
        self.field_map = Some(field_map);
        self
    }

    /// Drives one full produce/consume cycle: spawns the pool, runs the
    /// pacing loop to its deadline, and joins every worker.
    pub async fn run_load(&self) -> Result<RunTotals> {
        self.config.validate()?;

        let load = self.config.load.clone();
        let (tx, rx) = async_channel::bounded(load.num_consumers * 2);
        let counter = Arc::new(AtomicCounter::new(0));
        let end_time = Instant::now() + Duration::from_secs(load.duration_secs);

        let workers = spawn_consumers(
            load.num_consumers,
            rx,
            Arc::clone(&self.sink),
            ConsumerOptions {
                partition_field: self.config.stream.partition_field.clone(),
                max_records_per_put: self.config.stream.max_records_per_put,
                retry: self.config.retry.clone().into(),
            },
        );

        let produced = run_producer(
            self.records.clone(),
            self.field_map.clone(),
            counter,
            load,
            tx,
            end_time,
        )
        .await?;

        let mut totals = RunTotals {
            produced,
            ..Default::default()
        };
        for result in join_all(workers).await {
            match result {
                Ok(stats) => {
                    totals.delivered += stats.delivered;
                    totals.dropped += stats.dropped;
                }
                Err(e) => warn!(error = %e, "consumer task failed to join"),
            }
        }

        info!(
            produced = totals.produced,
            delivered = totals.delivered,
            dropped = totals.dropped,
            "load phase complete"
        );
        Ok(totals)
    }
}
