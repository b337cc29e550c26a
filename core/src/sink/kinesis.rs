use aws_config::BehaviorVersion;
use aws_sdk_kinesis::Client;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use tracing::{debug, info};

use crate::batch::StreamRecord;
use crate::config::StreamConfig;
use crate::errors::SinkError;
use crate::sink::{IngestionSink, PutOutcome};

pub struct KinesisSink {
    client: Client,
    stream_name: String,
}

impl KinesisSink {
    pub async fn new(config: &StreamConfig) -> Result<Self, SinkError> {
        let region = aws_config::Region::new(config.region.clone());
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        let client = Client::new(&aws_config);

        Ok(Self {
            client,
            stream_name: config.name.clone(),
        })
    }

    /// Confirms the stream is reachable before a run starts producing.
    pub async fn health_check(&self) -> Result<(), SinkError> {
        self.client
            .describe_stream_summary()
            .stream_name(&self.stream_name)
            .send()
            .await
            .map_err(|e| SinkError::ClientCreation {
                reason: format!(
                    "stream {} is not accessible: {}",
                    self.stream_name,
                    e.into_service_error()
                ),
            })?;

        info!(stream = %self.stream_name, "kinesis stream reachable");
        Ok(())
    }
}

impl IngestionSink for KinesisSink {
    async fn put_records(&self, records: &[StreamRecord]) -> Result<PutOutcome, SinkError> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.payload.clone()))
                    .partition_key(record.partition_key.clone())
                    .build()
                    .map_err(|e| SinkError::RecordEncoding {
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .client
            .put_records()
            .stream_name(&self.stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_provisioned_throughput_exceeded_exception() {
                    SinkError::Throttled {
                        reason: service_error.to_string(),
                    }
                } else {
                    SinkError::Request {
                        reason: service_error.to_string(),
                    }
                }
            })?;

        let failed_indices: Vec<usize> = response
            .records()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.error_code().is_some())
            .map(|(i, _)| i)
            .collect();

        if !failed_indices.is_empty() {
            debug!(
                failed = failed_indices.len(),
                attempted = records.len(),
                "put_records reported a partial failure"
            );
        }

        Ok(PutOutcome { failed_indices })
    }
}
