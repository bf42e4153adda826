// Ensemble Scorer
//
// Runs the three scoring models against one scaled vector in a fixed order
// (outlier detector, reconstruction model, classifier), timing each call.
// A fault in any model fails the whole scoring pass.

use serde::Serialize;
use std::time::Instant;

use crate::error::{EngineError, ModelError, Result};
use crate::features::ScaledVector;
use crate::models::autoencoder::reconstruction_error;
use crate::models::{argmax, Classifier, OutlierDetector, Reconstructor};

/// Outputs of the three scoring models for one flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTriple {
    /// Negated outlier decision function; higher = more anomalous
    pub if_score: f64,
    /// Reconstruction MSE
    pub ae_score: f64,
    /// 1 - P(benign)
    pub xgb_prob: f64,
    /// Arg-max class label
    pub pred_class: usize,
    /// Full per-class probability vector
    #[serde(rename = "class_probabilities")]
    pub probabilities: Vec<f64>,
}

/// Wall-clock time spent in each scoring model, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoringLatency {
    pub iso_ms: f64,
    pub ae_ms: f64,
    pub xgb_ms: f64,
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Borrowed view of the three scoring models
pub struct EnsembleScorer<'a> {
    outlier: &'a dyn OutlierDetector,
    reconstructor: &'a dyn Reconstructor,
    classifier: &'a dyn Classifier,
}

impl<'a> EnsembleScorer<'a> {
    pub fn new(
        outlier: &'a dyn OutlierDetector,
        reconstructor: &'a dyn Reconstructor,
        classifier: &'a dyn Classifier,
    ) -> Self {
        Self {
            outlier,
            reconstructor,
            classifier,
        }
    }

    /// Score one flow
    pub fn score(&self, vector: &ScaledVector) -> Result<(ScoreTriple, ScoringLatency)> {
        let mut latency = ScoringLatency::default();

        let start = Instant::now();
        let if_score = -self
            .outlier
            .decision_function(vector)
            .map_err(|e| scoring("isolation_forest", e))?;
        latency.iso_ms = elapsed_ms(start);

        let start = Instant::now();
        let ae_score = self
            .reconstructor
            .reconstruct(vector)
            .and_then(|recon| reconstruction_error(vector, &recon))
            .map_err(|e| scoring("autoencoder", e))?;
        latency.ae_ms = elapsed_ms(start);

        let start = Instant::now();
        let probabilities = self
            .classifier
            .predict_proba(vector)
            .map_err(|e| scoring("classifier", e))?;
        latency.xgb_ms = elapsed_ms(start);

        let benign = probabilities.first().copied().ok_or_else(|| {
            scoring(
                "classifier",
                ModelError::Invalid("classifier returned no probabilities".to_string()),
            )
        })?;
        let pred_class = argmax(&probabilities).unwrap_or(0);

        Ok((
            ScoreTriple {
                if_score,
                ae_score,
                xgb_prob: 1.0 - benign,
                pred_class,
                probabilities,
            },
            latency,
        ))
    }
}

fn scoring(stage: &'static str, source: ModelError) -> EngineError {
    EngineError::Scoring { stage, source }
}
