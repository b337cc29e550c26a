use serde::Deserialize;
use tracing::debug;

use crate::logs::MetricsExtractor;
use crate::stats::{LogStats, MessageTiming};

/// Structured metric object the processing function appends to its log
/// line, e.g. `START custom metrics {"msg_id":7,...}`.
#[derive(Debug, Deserialize)]
struct MetricLine {
    msg_id: u64,
    start_time: f64,
    end_time: f64,
    execution_time: f64,
}

/// Parses log lines ending in a JSON metric object, optionally gated on a
/// marker substring. Malformed lines are skipped; extraction continues with
/// partial data.
pub struct JsonMetricsExtractor {
    marker: Option<String>,
}

impl JsonMetricsExtractor {
    pub fn new(marker: Option<String>) -> Self {
        Self { marker }
    }
}

impl MetricsExtractor for JsonMetricsExtractor {
    fn extract(&self, lines: &[String], stats: &mut LogStats) {
        for line in lines {
            if let Some(marker) = &self.marker {
                if !line.contains(marker.as_str()) {
                    continue;
                }
            }
            let Some(json_start) = line.find('{') else {
                continue;
            };
            let parsed: MetricLine = match serde_json::from_str(line[json_start..].trim_end()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(error = %e, "skipping malformed metric line");
                    continue;
                }
            };
            stats.record(
                parsed.msg_id,
                MessageTiming {
                    start_time: parsed.start_time,
                    end_time: parsed.end_time,
                    execution_time: parsed.execution_time,
                },
            );
        }
    }
}
