use anyhow::{anyhow, bail, Result};
use inspection_engine::{Inspector, ModelRegistry};
use inspection_node::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use inspection_node::{api, telemetry, NodeConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration from file if available, otherwise use defaults
    let (config, config_error) = match NodeConfig::from_file(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (NodeConfig::default(), Some(e)),
    };

    telemetry::init_logging(&config.logging)?;

    info!("Starting Inspection Node v{}", env!("CARGO_PKG_VERSION"));
    match config_error {
        None => info!(path = %config_path, "Configuration loaded"),
        Some(e) => warn!(path = %config_path, error = %e, "Failed to load config file, using defaults"),
    }

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;

    if config.metrics.enabled {
        telemetry::install_metrics_exporter(config.metrics.listen_addr()?)?;
    } else {
        info!("Metrics exporter disabled");
    }
    telemetry::describe_metrics();

    let registry = ModelRegistry::load(&config.models.artifact_paths());
    if !registry.is_ready() {
        if config.models.require_loaded {
            error!("Model artifacts failed to load and models.require_loaded is set");
            bail!(
                "Model artifacts failed to load: {}",
                registry.load_error().unwrap_or("unknown reason")
            );
        }
        warn!(
            status = ?registry.status(),
            "Serving in degraded mode: inspections will be rejected until artifacts are present"
        );
    }

    info!(
        if_high = config.decision.if_high,
        ae_high = config.decision.ae_high,
        xgb_high = config.decision.xgb_high,
        explain_threshold = config.explain.risk_threshold,
        "Decision thresholds"
    );

    let inspector = Inspector::new(Arc::new(registry))
        .with_thresholds(config.decision)
        .with_explain_settings(config.explain);

    api::serve(&config.server, inspector).await
}
