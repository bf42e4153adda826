//! Hybrid anomaly/signature inspection engine.
//!
//! Scores a single network flow's feature vector with three pre-trained
//! models (an isolation-style outlier detector, a reconstruction model and a
//! multi-class boosted classifier), folds the scores into an ordered decision
//! cascade, and attaches per-feature attributions for high-risk flows.

pub mod decision;
pub mod error;
pub mod explain;
pub mod features;
pub mod inspector;
pub mod models;
pub mod scoring;

pub use decision::{Action, Confidence, Decision, DecisionThresholds, Reason, Verdict};
pub use error::{EngineError, ModelError, Result};
pub use explain::{Attribution, ExplainSettings, ImpactLabel};
pub use features::{RawFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use inspector::{InspectionReport, Inspector, LatencyReport};
pub use models::{ArtifactPaths, ArtifactStatus, ModelRegistry};
pub use scoring::{EnsembleScorer, ScoreTriple, ScoringLatency};
