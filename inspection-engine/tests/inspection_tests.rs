//! Integration tests for the inspection engine
//!
//! Drives the orchestrator end to end, both with stub models producing fixed
//! score triples and with JSON artifacts loaded from disk.

use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use inspection_engine::features::{FeatureVector, ScaledVector};
use inspection_engine::models::{Classifier, Explainer, OutlierDetector, Reconstructor, Scaler};
use inspection_engine::{
    Action, ArtifactPaths, Confidence, Decision, EngineError, Inspector, ModelError, ModelRegistry,
    RawFeatures, Reason, FEATURE_COUNT, FEATURE_NAMES,
};

struct Identity;

impl Scaler for Identity {
    fn transform(&self, v: &FeatureVector) -> ScaledVector {
        ScaledVector::from_array(v.values().clone())
    }
}

/// Native decision function is the negated outlier score
struct FixedOutlier(f64);

impl OutlierDetector for FixedOutlier {
    fn decision_function(&self, _: &ScaledVector) -> Result<f64, ModelError> {
        Ok(-self.0)
    }
}

/// Reconstruction off by a constant, so the MSE is that constant squared
struct Offset(f64);

impl Reconstructor for Offset {
    fn reconstruct(&self, v: &ScaledVector) -> Result<ScaledVector, ModelError> {
        Ok(ScaledVector::from_array(v.values() + self.0))
    }
}

struct FixedProbs(Vec<f64>);

impl Classifier for FixedProbs {
    fn num_classes(&self) -> usize {
        self.0.len()
    }

    fn predict_proba(&self, _: &ScaledVector) -> Result<Vec<f64>, ModelError> {
        Ok(self.0.clone())
    }
}

/// Pushes the first two features toward every class
struct TwoFeatures;

impl Explainer for TwoFeatures {
    fn attributions(&self, _: &ScaledVector, _: usize) -> Result<Vec<f64>, ModelError> {
        let mut out = vec![0.0; FEATURE_COUNT];
        out[0] = 0.9;
        out[1] = 0.3;
        out[2] = -1.0;
        Ok(out)
    }
}

fn inspector(if_score: f64, ae_score: f64, xgb_prob: f64) -> Inspector {
    let registry = ModelRegistry::new()
        .with_scaler(Identity)
        .with_outlier_detector(FixedOutlier(if_score))
        .with_reconstructor(Offset(ae_score.sqrt()))
        .with_classifier(FixedProbs(vec![1.0 - xgb_prob, xgb_prob]))
        .with_explainer(TwoFeatures);
    Inspector::new(Arc::new(registry))
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_behavioral_anomaly_blocks() {
        let report = inspector(0.06, 0.06, 0.1).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.decision, Decision::ReviewRequired);
        assert_eq!(report.reason, Reason::BehavioralAnomaly);
        assert_eq!(
            report.reason.as_str(),
            "Behavioral anomaly detected (IF + AE high) → possible zero-day"
        );
        assert_eq!(report.action, Action::Block);
        // risk 0.1 is below the explainability gate
        assert!(report.shap.is_empty());
    }

    #[test]
    fn test_known_signature_blocks() {
        let report = inspector(0.01, 0.01, 0.9).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.decision, Decision::ReviewRequired);
        assert_eq!(report.reason, Reason::KnownSignature);
        assert_eq!(report.action, Action::Block);
        assert_eq!(report.confidence, Confidence::High);
        assert_eq!(report.metrics.pred_class, 1);
        assert_eq!(report.attack_type, "Botnet");

        assert_eq!(report.shap.len(), 2);
        assert_eq!(report.shap[0].feature, FEATURE_NAMES[0]);
        assert_eq!(report.shap[1].feature, FEATURE_NAMES[1]);
        assert!(report.shap.iter().all(|a| a.shap_value > 0.0));
    }

    #[test]
    fn test_benign_burst_allows() {
        let report = inspector(0.2, 0.01, 0.1).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.decision, Decision::Normal);
        assert_eq!(report.reason, Reason::BenignBurst);
        assert_eq!(report.action, Action::Allow);
    }

    #[test]
    fn test_quiet_flow_allows() {
        let report = inspector(0.01, 0.01, 0.1).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.decision, Decision::Normal);
        assert_eq!(report.reason, Reason::NoAnomaly);
        assert_eq!(report.action, Action::Allow);
        assert!((report.risk_score - 0.1).abs() < 1e-9);
        assert_eq!(report.confidence, Confidence::Low);
        assert_eq!(report.latency.shap_ms, 0.0);
    }

    #[test]
    fn test_benign_prediction_with_high_risk_is_zero_day() {
        let report = inspector(0.7, 0.9, 0.2).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.metrics.pred_class, 0);
        assert_eq!(report.attack_type, "Potential Zero-Day (Anomaly)");
        assert_eq!(report.confidence, Confidence::High);
        // benign prediction: explains the likeliest attack class instead
        assert!(!report.shap.is_empty());
    }

    #[test]
    fn test_no_scaler_is_unavailable() {
        let registry = ModelRegistry::new()
            .with_outlier_detector(FixedOutlier(0.0))
            .with_reconstructor(Offset(0.0))
            .with_classifier(FixedProbs(vec![1.0, 0.0]));
        let err = Inspector::new(Arc::new(registry))
            .inspect(&RawFeatures::new())
            .unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(err.to_string(), "Models not loaded (Unknown reason)");
    }

    #[test]
    fn test_malformed_fields_do_not_fail() {
        let mut raw = RawFeatures::new();
        raw.insert("Flow Duration".to_string(), json!("not-a-number"));
        raw.insert("Flow Bytes/s".to_string(), json!(null));
        raw.insert("SYN Flag Count".to_string(), json!({"nested": 1}));
        raw.insert("ACK Flag Count".to_string(), json!(" 3 "));
        raw.insert("Unrelated Field".to_string(), json!(42));

        let report = inspector(0.01, 0.01, 0.1).inspect(&raw).unwrap();
        // ACK Flag Count parsed, the other 39 defaulted
        assert_eq!(report.defaulted_features.len(), FEATURE_COUNT - 1);
    }
}

#[cfg(test)]
mod artifact_tests {
    use super::*;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn syn_index() -> usize {
        FEATURE_NAMES.iter().position(|n| *n == "SYN Flag Count").unwrap()
    }

    /// Class 1 fires when SYN Flag Count >= 10
    fn write_artifacts(dir: &Path) {
        write(
            dir,
            "scaler.json",
            json!({"mean": vec![0.0; FEATURE_COUNT], "scale": vec![1.0; FEATURE_COUNT]}),
        );
        write(
            dir,
            "isolation_forest.json",
            json!({"max_samples": 256, "trees": [{"nodes": [{"type": "leaf", "samples": 256}]}]}),
        );
        write(
            dir,
            "classifier.json",
            json!({"num_class": 3, "base_score": 0.0, "trees": [
                {"class": 0, "nodes": [{"type": "leaf", "value": 1.0, "cover": 100.0}]},
                {"class": 1, "nodes": [
                    {"type": "split", "feature": syn_index(), "threshold": 10.0,
                     "left": 1, "right": 2, "cover": 100.0},
                    {"type": "leaf", "value": -1.0, "cover": 90.0},
                    {"type": "leaf", "value": 4.0, "cover": 10.0}
                ]},
                {"class": 2, "nodes": [{"type": "leaf", "value": -1.0, "cover": 100.0}]}
            ]}),
        );
        let weights: Vec<Vec<f64>> = (0..FEATURE_COUNT)
            .map(|i| (0..FEATURE_COUNT).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        write(
            dir,
            "autoencoder.json",
            json!({"layers": [{"weights": weights, "bias": vec![0.0; FEATURE_COUNT], "activation": "linear"}]}),
        );
    }

    fn loaded(dir: &Path) -> Inspector {
        let registry = ModelRegistry::load(&ArtifactPaths::in_dir(dir));
        assert!(registry.is_ready(), "{:?}", registry.load_error());
        Inspector::new(Arc::new(registry))
    }

    #[test]
    fn test_syn_flood_detected_and_explained() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let mut raw = RawFeatures::new();
        raw.insert("SYN Flag Count".to_string(), json!(50));
        let report = loaded(dir.path()).inspect(&raw).unwrap();

        assert_eq!(report.decision, Decision::ReviewRequired);
        assert_eq!(report.reason, Reason::KnownSignature);
        assert_eq!(report.metrics.pred_class, 1);
        assert!(report.metrics.xgb_prob > 0.9);
        assert!(report.metrics.if_score.abs() < 1e-12);
        assert!(report.metrics.ae_score.abs() < 1e-12);

        assert_eq!(report.shap.len(), 1);
        assert_eq!(report.shap[0].feature, "SYN Flag Count");
        assert!((report.shap[0].shap_value - 4.5).abs() < 1e-9);
        assert_eq!(report.shap[0].value, 50.0);
    }

    #[test]
    fn test_quiet_flow_allowed() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let report = loaded(dir.path()).inspect(&RawFeatures::new()).unwrap();
        assert_eq!(report.decision, Decision::Normal);
        assert_eq!(report.action, Action::Allow);
        assert_eq!(report.metrics.pred_class, 0);
    }

    #[test]
    fn test_missing_artifacts_surface_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::load(&ArtifactPaths::in_dir(dir.path()));
        let err = Inspector::new(Arc::new(registry))
            .inspect(&RawFeatures::new())
            .unwrap_err();
        match err {
            EngineError::NotReady { missing, detail } => {
                assert_eq!(missing, "scaler");
                assert!(detail.unwrap_or_default().contains("scaler.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
