use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::batch::{Batch, FieldMap, build_messages};
use crate::config::LoadConfig;
use crate::counter::AtomicCounter;
use crate::errors::{ConfigError, Result};

/// Runs the pacing loop until the deadline or source exhaustion, then
/// enqueues exactly `num_consumers` sentinels so every worker observes one
/// termination signal.
///
/// One batch of `batch_size` messages is due every `batch_size / rate`
/// seconds. The inner loop produces back-to-back batches whenever a sleep
/// overshoots, so the schedule self-corrects instead of drifting. With a
/// finite record source, production stops before a claimed range would run
/// past the available records; the short tail is never enqueued.
///
/// Returns the number of messages actually enqueued, which is the
/// expected-delivery target for log polling.
pub async fn run_producer(
    records: Option<Arc<Vec<Vec<String>>>>,
    field_map: Option<FieldMap>,
    counter: Arc<AtomicCounter>,
    load: LoadConfig,
    queue: Sender<Option<Batch>>,
    end_time: Instant,
) -> Result<u64> {
    if !(load.rate > 0.0) || !load.rate.is_finite() {
        return Err(ConfigError::Invalid {
            message: format!("rate must be a positive number, got {}", load.rate),
        }
        .into());
    }

    let source = records.as_deref().map(Vec::as_slice);
    let batch_period = Duration::from_secs_f64(load.batch_size as f64 / load.rate);
    let mut next_batch_time = Instant::now();
    let mut total_produced = 0u64;

    info!(
        batch_size = load.batch_size,
        period_ms = batch_period.as_millis() as u64,
        "batch producer started"
    );

    'pacing: while Instant::now() < end_time {
        if next_batch_time > Instant::now() {
            sleep_until(next_batch_time).await;
        }

        // Produce until back on schedule; several batches in a row after an
        // oversleep.
        let mut now = Instant::now();
        while now >= next_batch_time && now < end_time {
            let start_index = counter.fetch_add(load.batch_size as u64);
            if let Some(records) = source {
                if start_index as usize + load.batch_size >= records.len() {
                    debug!(start_index, "record source exhausted, draining");
                    break 'pacing;
                }
            }

            let messages = build_messages(source, start_index, load.batch_size, field_map.as_ref());
            let produced = messages.len() as u64;
            if queue
                .send(Some(Batch {
                    start_index,
                    messages,
                }))
                .await
                .is_err()
            {
                debug!("queue closed, stopping production");
                break 'pacing;
            }

            total_produced += produced;
            next_batch_time += batch_period;
            now = Instant::now();
        }
    }

    for _ in 0..load.num_consumers {
        if queue.send(None).await.is_err() {
            break;
        }
    }

    info!(total_produced, "batch producer finished");
    Ok(total_produced)
}
