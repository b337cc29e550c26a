pub mod kinesis;

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::batch::StreamRecord;
use crate::errors::SinkError;

/// Result of a single delivery attempt. `failed_indices` point into the
/// slice of records that was attempted, in order.
#[derive(Debug, Default, Clone)]
pub struct PutOutcome {
    pub failed_indices: Vec<usize>,
}

/// Abstract stream backend accepting partitioned record batches.
///
/// `put_records` attempts delivery exactly once: partial failures are
/// reported through `PutOutcome`, wholesale failures through `SinkError`.
/// Retries live in `send_with_retry` so every implementation gets the same
/// subset-retry semantics.
pub trait IngestionSink: Send + Sync + 'static {
    fn put_records(
        &self,
        records: &[StreamRecord],
    ) -> impl Future<Output = Result<PutOutcome, SinkError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum delivery attempts per chunk, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// What `send_with_retry` managed to do with one chunk of records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Delivers `records`, retrying only the failed subset after a partial
/// failure and the whole remainder after a transient error, with a fixed
/// delay between attempts. Exhausting the retry budget drops whatever is
/// still failing; the caller logs and the run continues.
pub async fn send_with_retry<S: IngestionSink>(
    sink: &S,
    mut records: Vec<StreamRecord>,
    policy: &RetryPolicy,
) -> DeliveryReport {
    let total = records.len();
    if total == 0 {
        return DeliveryReport::default();
    }

    let mut attempt = 0;
    while attempt < policy.max_retries {
        match sink.put_records(&records).await {
            Ok(outcome) if outcome.failed_indices.is_empty() => {
                return DeliveryReport {
                    delivered: total,
                    dropped: 0,
                };
            }
            Ok(outcome) => {
                debug!(
                    attempt = attempt + 1,
                    failed = outcome.failed_indices.len(),
                    "partial failure, retrying failed subset"
                );
                records = outcome
                    .failed_indices
                    .iter()
                    .filter_map(|&i| records.get(i).cloned())
                    .collect();
            }
            Err(e) if e.is_transient() => {
                debug!(attempt = attempt + 1, error = %e, "transient sink error, retrying");
            }
            Err(e) => {
                warn!(error = %e, remaining = records.len(), "unrecoverable sink error, dropping records");
                return DeliveryReport {
                    delivered: total - records.len(),
                    dropped: records.len(),
                };
            }
        }

        attempt += 1;
        if attempt < policy.max_retries {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    DeliveryReport {
        delivered: total - records.len(),
        dropped: records.len(),
    }
}
