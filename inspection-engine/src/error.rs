use thiserror::Error;

/// Errors raised while loading or evaluating a model artifact
#[derive(Error, Debug)]
pub enum ModelError {
    /// Artifact file could not be read
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Artifact file is not valid JSON for its model type
    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Artifact parsed but is structurally unusable
    #[error("Invalid artifact: {0}")]
    Invalid(String),

    /// Input does not match the width the model was trained on
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Explainer cannot be built for, or applied to, the given classifier
    #[error("Explainer incompatible: {0}")]
    Incompatible(String),
}

/// Errors that can occur while inspecting a flow
#[derive(Error, Debug)]
pub enum EngineError {
    /// A required artifact is missing; the engine cannot serve decisions
    #[error("{}", not_ready_detail(.detail))]
    NotReady {
        /// Which artifact is missing
        missing: &'static str,
        /// Load failure recorded at startup, if any
        detail: Option<String>,
    },

    /// One of the three scoring models failed during inference
    #[error("{stage} inference failed: {source}")]
    Scoring {
        stage: &'static str,
        #[source]
        source: ModelError,
    },
}

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

fn not_ready_detail(detail: &Option<String>) -> String {
    match detail {
        Some(e) => format!("Models not loaded. Error: {e}"),
        None => "Models not loaded (Unknown reason)".to_string(),
    }
}

impl EngineError {
    /// True when the error means "service unavailable" rather than a computation fault
    pub fn is_not_ready(&self) -> bool {
        matches!(self, EngineError::NotReady { .. })
    }
}
