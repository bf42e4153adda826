//! Inspection Node Library
//!
//! HTTP service around the inspection engine: configuration loading,
//! structured logging, Prometheus metrics and the inspection API.

pub mod api;
pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use api::{create_router, ApiError, ApiState, HealthResponse, InspectRequest};
pub use config::{LoggingConfig, MetricsConfig, ModelsConfig, NodeConfig, ServerConfig};
