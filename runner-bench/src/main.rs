use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use bench_core::config::RunConfig;
use bench_core::harness::RunContext;
use bench_core::logs::cloudwatch::CloudWatchLogSource;
use bench_core::logs::extract::JsonMetricsExtractor;
use bench_core::logs::{PollOutcome, poll_until_settled};
use bench_core::records::sentences_from_text;
use bench_core::sink::kinesis::KinesisSink;
use bench_core::stats::RunReport;
use bench_core::telemetry::init_tracing;

/// Entry point for one benchmark run against a deployed pipeline.
///
/// What it does at a high-level:
///     Load config from the file given as the first argument, or from
///     the BENCH_CONFIG environment variable.
///     Drive the load phase: paced producer feeding a consumer pool that
///     writes to the input stream.
///     Poll the processing function's log group until every produced
///     message has been observed, or progress goes idle.
///     Append the percentile report to the output file.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::from_file(&path)?,
        None => RunConfig::from_env()?,
    };
    config.validate()?;

    // Log events older than this cannot belong to this run.
    let run_start_ms = chrono::Utc::now().timestamp_millis();

    let sink = KinesisSink::new(&config.stream).await?;
    sink.health_check()
        .await
        .context("ingestion sink health check failed")?;

    let mut ctx = RunContext::new(config.clone(), Arc::new(sink));
    if let Some(source) = &config.source {
        let text = std::fs::read_to_string(&source.path)
            .with_context(|| format!("failed to read record source {}", source.path))?;
        let records = sentences_from_text(&text, source.words_per_sentence);
        info!(records = records.len(), path = %source.path, "loaded record source");
        ctx = ctx.with_records(records, source.field_map.clone());
    }

    let totals = ctx.run_load().await?;
    if totals.produced == 0 {
        warn!("nothing was produced, skipping log polling");
        return Ok(());
    }

    let log_source = CloudWatchLogSource::new(&config.logs).await?;
    let extractor = JsonMetricsExtractor::new(Some(config.logs.filter_pattern.clone()));
    let policy = config.logs.policy();

    let polling = poll_until_settled(
        &log_source,
        &extractor,
        totals.produced,
        run_start_ms,
        &policy,
    );
    let (stats, outcome) = match config.logs.watchdog_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), polling)
            .await
            .map_err(|_| bench_core::errors::LogError::Watchdog { seconds: secs })??,
        None => polling.await?,
    };

    if outcome == PollOutcome::Idle {
        warn!(
            observed = stats.observed_count(),
            expected = totals.produced,
            "run settled without observing every message"
        );
    }

    let report = RunReport::from_stats(
        &stats,
        config.load.rate,
        config.load.replica,
        totals.produced,
    )
    .context("no execution times were observed, nothing to report")?;
    report
        .append_to_file(&config.report.output_path)
        .with_context(|| format!("failed to write report to {}", config.report.output_path))?;

    info!(
        output = %config.report.output_path,
        median_us = report.median_execution_us,
        p99_us = report.p99_execution_us,
        "run report appended"
    );
    Ok(())
}
