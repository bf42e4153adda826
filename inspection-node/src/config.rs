use inspection_engine::{ArtifactPaths, DecisionThresholds, ExplainSettings};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Config file used when `MLWAF_CONFIG` is not set (extension resolved by the loader)
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "MLWAF_CONFIG";

/// Main configuration for the inspection node
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP API server
    pub server: ServerConfig,
    /// Model artifact locations
    pub models: ModelsConfig,
    /// Decision cascade thresholds
    pub decision: DecisionThresholds,
    /// Explainability gate
    pub explain: ExplainSettings,
    /// Metrics and monitoring
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding the exported JSON artifacts
    pub dir: PathBuf,
    /// Exit at startup if any artifact fails to load instead of serving 503s
    pub require_loaded: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            require_loaded: false,
        }
    }
}

impl ModelsConfig {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.dir)
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    pub enabled: bool,
    /// Prometheus scrape address
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:9100".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr.parse()
    }
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr.parse()
    }
}

impl NodeConfig {
    /// Load configuration from file, layered with `MLWAF__SECTION__KEY` environment overrides
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("MLWAF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.server
            .listen_addr()
            .map_err(|e| format!("Invalid server listen address '{}': {e}", self.server.listen_addr))?;

        if self.metrics.enabled {
            self.metrics
                .listen_addr()
                .map_err(|e| format!("Invalid metrics listen address '{}': {e}", self.metrics.listen_addr))?;
        }

        let d = &self.decision;
        if ![d.if_high, d.ae_high, d.xgb_high].iter().all(|t| t.is_finite()) {
            return Err("Decision thresholds must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&d.xgb_high) {
            return Err(format!("xgb_high must be a probability, got {}", d.xgb_high));
        }
        if d.ae_high < 0.0 {
            return Err(format!("ae_high cannot be negative, got {}", d.ae_high));
        }

        if !self.explain.risk_threshold.is_finite() {
            return Err("Explainability risk threshold must be finite".to_string());
        }
        if self.explain.top_k == 0 {
            return Err("Explainability top_k must be at least 1".to_string());
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => return Err(format!("Unknown log format '{other}' (expected text or json)")),
        }

        Ok(())
    }
}
