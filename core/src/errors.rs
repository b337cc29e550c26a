use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Log source error: {0}")]
    Log(#[from] LogError),

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Failed to load configuration from {source}: {error}")]
    LoadFailed {
        source: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to create sink client: {reason}")]
    ClientCreation { reason: String },

    #[error("Request to the stream failed: {reason}")]
    Request { reason: String },

    #[error("Stream throttled the request: {reason}")]
    Throttled { reason: String },

    #[error("Record could not be encoded for the stream: {reason}")]
    RecordEncoding { reason: String },
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to create log client: {reason}")]
    ClientCreation { reason: String },

    #[error("Failed to fetch log events: {reason}")]
    Fetch { reason: String },

    #[error("Log polling watchdog expired after {seconds}s")]
    Watchdog { seconds: u64 },
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BenchError {
    fn from(err: serde_yaml::Error) -> Self {
        BenchError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl SinkError {
    /// Whether a failed attempt may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Request { .. } => true,
            SinkError::Throttled { .. } => true,
            SinkError::ClientCreation { .. } => false,
            SinkError::RecordEncoding { .. } => false,
        }
    }
}

impl BenchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            BenchError::Sink(e) => e.is_transient(),
            BenchError::Log(LogError::Fetch { .. }) => true,
            BenchError::Config(_) => false,
            BenchError::Serialization { .. } => false,
            _ => false,
        }
    }
}
