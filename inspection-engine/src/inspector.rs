// Inspection Orchestrator
//
// Sequences normalization, ensemble scoring, the decision cascade and the
// conditional explainability tail, and assembles the full inspection report.

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::decision::{attack_label, evaluate, Action, Confidence, Decision, DecisionThresholds, Reason};
use crate::error::{EngineError, Result};
use crate::explain::{explain, Attribution, ExplainSettings};
use crate::features::{normalize, DefaultedFeature, RawFeatures};
use crate::models::ModelRegistry;
use crate::scoring::{elapsed_ms, EnsembleScorer, ScoreTriple, ScoringLatency};

/// Per-stage latency of one inspection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyReport {
    /// Normalization through decision; excludes explainability
    pub total_ms: f64,
    pub shap_ms: f64,
    pub breakdown: ScoringLatency,
}

/// Full decision payload for one flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionReport {
    pub status: &'static str,
    pub decision: Decision,
    pub risk_score: f64,
    pub reason: Reason,
    pub action: Action,
    pub confidence: Confidence,
    pub attack_type: &'static str,
    pub metrics: ScoreTriple,
    pub latency: LatencyReport,
    pub shap: Vec<Attribution>,
    pub defaulted_features: Vec<DefaultedFeature>,
}

/// Stateless inspector over a shared, read-only model registry
#[derive(Debug, Clone)]
pub struct Inspector {
    registry: Arc<ModelRegistry>,
    thresholds: DecisionThresholds,
    explain: ExplainSettings,
}

impl Inspector {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            thresholds: DecisionThresholds::default(),
            explain: ExplainSettings::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: DecisionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_explain_settings(mut self, settings: ExplainSettings) -> Self {
        self.explain = settings;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    pub fn explain_settings(&self) -> &ExplainSettings {
        &self.explain
    }

    fn not_ready(&self, missing: &'static str) -> EngineError {
        counter!("inspection_not_ready_total", 1, "missing" => missing);
        EngineError::NotReady {
            missing,
            detail: self.registry.load_error().map(str::to_string),
        }
    }

    /// Inspect one flow
    ///
    /// Returns `EngineError::NotReady` when any required artifact is missing
    /// and `EngineError::Scoring` when a scoring model faults. Per-field input
    /// problems and explainability faults never fail the request.
    pub fn inspect(&self, raw: &RawFeatures) -> Result<InspectionReport> {
        let registry = &*self.registry;
        let scaler = registry.scaler().ok_or_else(|| self.not_ready("scaler"))?;
        let outlier = registry
            .outlier_detector()
            .ok_or_else(|| self.not_ready("isolation_forest"))?;
        let reconstructor = registry
            .reconstructor()
            .ok_or_else(|| self.not_ready("autoencoder"))?;
        let classifier = registry
            .classifier()
            .ok_or_else(|| self.not_ready("classifier"))?;

        let start = Instant::now();

        let input = normalize(raw, Some(scaler));
        if !input.defaulted.is_empty() {
            counter!("inspection_defaulted_features_total", input.defaulted.len() as u64);
            debug!(
                features = ?input.defaulted.iter().map(|d| d.feature).collect::<Vec<_>>(),
                "Defaulted features"
            );
        }

        let (scores, breakdown) = EnsembleScorer::new(outlier, reconstructor, classifier)
            .score(&input.scaled)
            .map_err(|e| {
                warn!(error = %e, "Scoring failed");
                counter!("inspection_scoring_failures_total", 1);
                e
            })?;

        let verdict = evaluate(&self.thresholds, scores.if_score, scores.ae_score, scores.xgb_prob);
        let total_ms = elapsed_ms(start);

        let explanation = explain(
            &self.explain,
            registry.explainer(),
            &input.scaled,
            verdict.risk_score,
            scores.pred_class,
            &scores.probabilities,
        );

        let attack_type = attack_label(scores.pred_class, verdict.risk_score);

        counter!(
            "inspection_decisions_total",
            1,
            "decision" => verdict.decision.as_str(),
            "action" => verdict.action.as_str()
        );
        histogram!("inspection_stage_duration_ms", breakdown.iso_ms, "stage" => "iso");
        histogram!("inspection_stage_duration_ms", breakdown.ae_ms, "stage" => "ae");
        histogram!("inspection_stage_duration_ms", breakdown.xgb_ms, "stage" => "xgb");
        histogram!("inspection_stage_duration_ms", explanation.shap_ms, "stage" => "shap");
        histogram!("inspection_duration_ms", total_ms);

        info!(
            decision = %verdict.decision,
            action = verdict.action.as_str(),
            risk_score = verdict.risk_score,
            if_score = scores.if_score,
            ae_score = scores.ae_score,
            xgb_prob = scores.xgb_prob,
            pred_class = scores.pred_class,
            attack_type,
            total_ms,
            "Flow inspected"
        );

        Ok(InspectionReport {
            status: "success",
            decision: verdict.decision,
            risk_score: verdict.risk_score,
            reason: verdict.reason,
            action: verdict.action,
            confidence: verdict.confidence,
            attack_type,
            metrics: scores,
            latency: LatencyReport {
                total_ms,
                shap_ms: explanation.shap_ms,
                breakdown,
            },
            shap: explanation.attributions,
            defaulted_features: input.defaulted,
        })
    }
}
