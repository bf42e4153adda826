use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use inspection_engine::{
    ArtifactStatus, DecisionThresholds, EngineError, ExplainSettings, InspectionReport, Inspector,
    RawFeatures, FEATURE_COUNT,
};
use serde::{Deserialize, Serialize};
use serde_json::{value::RawValue, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument};

use crate::config::ServerConfig;

/// Shared API state
#[derive(Debug, Clone)]
pub struct ApiState {
    pub inspector: Arc<Inspector>,
}

/// Inspection request: raw feature values keyed by feature name
///
/// Values stay undecoded until [`InspectRequest::into_features`], so a literal
/// that does not fit an f64 only defaults its own feature.
#[derive(Debug, Deserialize)]
pub struct InspectRequest {
    pub features: HashMap<String, Box<RawValue>>,
}

impl InspectRequest {
    /// Decode each feature value on its own; undecodable ones become null
    pub fn into_features(self) -> RawFeatures {
        self.features
            .into_iter()
            .map(|(name, raw)| {
                let value = serde_json::from_str(raw.get()).unwrap_or_else(|e| {
                    debug!(feature = %name, error = %e, "Undecodable feature value");
                    Value::Null
                });
                (name, value)
            })
            .collect()
    }
}

/// Liveness probe response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}

/// Engine status response
#[derive(Debug, Serialize)]
pub struct EngineStatusResponse {
    pub ready: bool,
    pub models_loaded: bool,
    pub artifacts: ArtifactStatus,
    pub load_error: Option<String>,
    pub feature_count: usize,
    pub thresholds: DecisionThresholds,
    pub explain: ExplainSettings,
    pub timestamp: String,
}

/// HTTP-facing error; body is `{"detail": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_not_ready() {
            ApiError::Unavailable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Inspect one flow
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn inspect(
    State(state): State<ApiState>,
    Json(request): Json<InspectRequest>,
) -> Result<Json<InspectionReport>, ApiError> {
    let inspector = Arc::clone(&state.inspector);
    let features = request.into_features();
    let report = tokio::task::spawn_blocking(move || inspector.inspect(&features))
        .await
        .map_err(|e| {
            error!(error = %e, "Inspection task failed");
            ApiError::Internal(format!("Inspection task failed: {e}"))
        })??;

    Ok(Json(report))
}

/// Liveness probe: reports whether the scaler artifact loaded
async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        models_loaded: state.inspector.registry().models_loaded(),
    })
}

/// Artifact presence, readiness and active thresholds
#[instrument(skip(state))]
async fn engine_status(State(state): State<ApiState>) -> Json<EngineStatusResponse> {
    let registry = state.inspector.registry();
    Json(EngineStatusResponse {
        ready: registry.is_ready(),
        models_loaded: registry.models_loaded(),
        artifacts: registry.status(),
        load_error: registry.load_error().map(str::to_string),
        feature_count: FEATURE_COUNT,
        thresholds: *state.inspector.thresholds(),
        explain: *state.inspector.explain_settings(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Create the API router with all endpoints
pub fn create_router(inspector: Inspector) -> Router {
    let state = ApiState {
        inspector: Arc::new(inspector),
    };

    Router::new()
        .route("/api/v1/inspect", post(inspect))
        .route("/api/v1/engine/status", get(engine_status))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the inspection API server
#[instrument(skip_all)]
pub async fn serve(config: &ServerConfig, inspector: Inspector) -> Result<()> {
    let app = create_router(inspector);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    info!(addr = %config.listen_addr, "Inspection API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    info!("Inspection API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
