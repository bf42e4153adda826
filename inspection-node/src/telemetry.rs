use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize structured logging; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("inspection_node={0},inspection_engine={0}", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

/// Initialize metrics descriptions
pub fn describe_metrics() {
    describe_counter!(
        "inspection_decisions_total",
        "Total number of inspections by decision and action"
    );
    describe_counter!(
        "inspection_not_ready_total",
        "Inspections rejected because a model artifact is missing"
    );
    describe_counter!(
        "inspection_scoring_failures_total",
        "Inspections failed by a scoring model fault"
    );
    describe_counter!(
        "inspection_explain_failures_total",
        "Attribution computations that faulted and returned empty"
    );
    describe_counter!(
        "inspection_defaulted_features_total",
        "Feature values replaced by 0.0 because they were missing or malformed"
    );
    describe_histogram!(
        "inspection_stage_duration_ms",
        Unit::Milliseconds,
        "Per-stage inspection latency (iso, ae, xgb, shap)"
    );
    describe_histogram!(
        "inspection_duration_ms",
        Unit::Milliseconds,
        "Inspection latency from normalization through decision"
    );
}

/// Install the Prometheus exporter with its own HTTP listener
pub fn install_metrics_exporter(listen_addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(metrics_addr = %listen_addr, "Prometheus metrics server started");
    Ok(())
}
