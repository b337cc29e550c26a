use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::errors::Result;

/// Timing facts for one message, merged across duplicate log sightings:
/// earliest start, latest end, fastest execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MessageTiming {
    pub start_time: f64,
    pub end_time: f64,
    pub execution_time: f64,
}

/// Everything observed in the logs so far. Aggregates widen monotonically
/// across polls.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LogStats {
    pub timings: HashMap<u64, MessageTiming>,
    pub min_start_time: Option<f64>,
    pub max_start_time: Option<f64>,
    pub max_end_time: Option<f64>,
}

impl LogStats {
    pub fn observed_count(&self) -> usize {
        self.timings.len()
    }

    pub fn record(&mut self, msg_id: u64, timing: MessageTiming) {
        self.min_start_time = Some(
            self.min_start_time
                .map_or(timing.start_time, |v| v.min(timing.start_time)),
        );
        self.max_start_time = Some(
            self.max_start_time
                .map_or(timing.start_time, |v| v.max(timing.start_time)),
        );
        self.max_end_time = Some(
            self.max_end_time
                .map_or(timing.end_time, |v| v.max(timing.end_time)),
        );

        self.timings
            .entry(msg_id)
            .and_modify(|existing| {
                existing.start_time = existing.start_time.min(timing.start_time);
                existing.end_time = existing.end_time.max(timing.end_time);
                existing.execution_time = existing.execution_time.min(timing.execution_time);
            })
            .or_insert(timing);
    }

    /// End-to-end span in the log's own timebase.
    pub fn duration(&self) -> Option<f64> {
        match (self.min_start_time, self.max_end_time) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

/// Nearest-rank percentile over an ascending slice. `pct` in [0, 100].
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// One appended block of the run report file.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input_rate: f64,
    pub replica: Option<u32>,
    pub total_records: u64,
    pub duration_secs: f64,
    pub median_execution_us: f64,
    pub p95_execution_us: f64,
    pub p99_execution_us: f64,
}

impl RunReport {
    /// None when no execution times were observed.
    pub fn from_stats(
        stats: &LogStats,
        input_rate: f64,
        replica: Option<u32>,
        total_records: u64,
    ) -> Option<Self> {
        let mut times: Vec<f64> = stats.timings.values().map(|t| t.execution_time).collect();
        if times.is_empty() {
            return None;
        }
        times.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            input_rate,
            replica,
            total_records,
            duration_secs: stats.duration().unwrap_or(0.0),
            median_execution_us: percentile(&times, 50.0).unwrap_or(0.0),
            p95_execution_us: percentile(&times, 95.0).unwrap_or(0.0),
            p99_execution_us: percentile(&times, 99.0).unwrap_or(0.0),
        })
    }

    pub fn append_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "Input Rate: {} records per second", self.input_rate)?;
        match self.replica {
            Some(replica) => writeln!(file, "Replica: {replica}")?,
            None => writeln!(file, "Replica: unset")?,
        }
        writeln!(file, "Total Records: {}", self.total_records)?;
        writeln!(file, "Duration: {:.2} seconds", self.duration_secs)?;
        writeln!(
            file,
            "Median Execution Time: {:.2} microseconds",
            self.median_execution_us
        )?;
        writeln!(
            file,
            "95th Percentile Execution Time: {:.2} microseconds",
            self.p95_execution_us
        )?;
        writeln!(
            file,
            "99th Percentile Execution Time: {:.2} microseconds",
            self.p99_execution_us
        )?;
        writeln!(file)?;
        Ok(())
    }
}
