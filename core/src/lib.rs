pub mod batch;
pub mod config;
pub mod consumer;
pub mod counter;
pub mod errors;
pub mod harness;
pub mod logs;
pub mod producer;
pub mod records;
pub mod sink;
pub mod stats;
pub mod telemetry;

pub use config::RunConfig;
pub use errors::{BenchError, Result};
pub use harness::{RunContext, RunTotals};
