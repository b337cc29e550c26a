use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::batch::FieldMap;
use crate::errors::ConfigError;
use crate::logs::PollPolicy;
use crate::sink::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub stream: StreamConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub logs: LogPollConfig,
    pub report: ReportConfig,
    #[serde(default)]
    pub source: Option<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    pub name: String,
    pub region: String,
    /// Message field used as the partition key; `msg_id` when unset.
    pub partition_field: Option<String>,
    #[serde(default = "default_max_records_per_put")]
    pub max_records_per_put: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    /// Target input rate in messages per second.
    pub rate: f64,
    pub batch_size: usize,
    pub num_consumers: usize,
    pub duration_secs: u64,
    /// Downstream replica/concurrency setting, recorded in the report.
    #[serde(default)]
    pub replica: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogPollConfig {
    pub log_group: String,
    pub region: String,
    #[serde(default = "default_filter_pattern")]
    pub filter_pattern: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Fraction of expected messages that must be seen before the idle
    /// fallback may terminate the poll loop.
    #[serde(default = "default_completion_fraction")]
    pub completion_fraction: f64,
    /// Hard ceiling on the whole polling phase.
    #[serde(default)]
    pub watchdog_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub path: String,
    #[serde(default = "default_words_per_sentence")]
    pub words_per_sentence: usize,
    pub field_map: FieldMap,
}

fn default_max_records_per_put() -> usize {
    500
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_filter_pattern() -> String {
    "custom metrics".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_completion_fraction() -> f64 {
    0.9
}

fn default_words_per_sentence() -> usize {
    10
}

impl RunConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            source: path.to_string(),
            error: Box::new(e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            source: path.to_string(),
            error: Box::new(e),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var("BENCH_CONFIG").map_err(|_| ConfigError::MissingField {
            field: "BENCH_CONFIG environment variable".to_string(),
        })?;
        serde_yaml::from_str(&config_str).map_err(|e| ConfigError::LoadFailed {
            source: "BENCH_CONFIG".to_string(),
            error: Box::new(e),
        })
    }

    /// Fatal checks that must pass before anything is produced.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.name.is_empty() {
            return Err(ConfigError::Invalid {
                message: "stream name cannot be empty".to_string(),
            });
        }
        if !(self.load.rate > 0.0) || !self.load.rate.is_finite() {
            return Err(ConfigError::Invalid {
                message: format!("rate must be a positive number, got {}", self.load.rate),
            });
        }
        if self.load.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "batch size must be positive".to_string(),
            });
        }
        if self.load.num_consumers == 0 {
            return Err(ConfigError::Invalid {
                message: "consumer count must be positive".to_string(),
            });
        }
        if self.stream.max_records_per_put == 0 {
            return Err(ConfigError::Invalid {
                message: "max records per put must be positive".to_string(),
            });
        }
        if self.logs.log_group.is_empty() {
            return Err(ConfigError::Invalid {
                message: "log group cannot be empty".to_string(),
            });
        }
        if !(self.logs.completion_fraction > 0.0 && self.logs.completion_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "completion fraction must be in (0, 1], got {}",
                    self.logs.completion_fraction
                ),
            });
        }
        Ok(())
    }
}

impl LogPollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            completion_fraction: self.completion_fraction,
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}
