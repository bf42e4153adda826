// Model registry
//
// Immutable context holding every loaded artifact. Built once at startup and
// shared by reference (Arc) across all inspections; nothing in here is ever
// written after construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    Classifier, DenseAutoencoder, Explainer, GradientBoostedClassifier, IsolationForest,
    OutlierDetector, Reconstructor, Scaler, StandardScaler, TreePathExplainer,
};
use crate::error::ModelError;

/// Locations of the exported artifacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub isolation_forest: PathBuf,
    pub autoencoder: PathBuf,
    pub classifier: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside a model directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            scaler: dir.join("scaler.json"),
            isolation_forest: dir.join("isolation_forest.json"),
            autoencoder: dir.join("autoencoder.json"),
            classifier: dir.join("classifier.json"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir("models")
    }
}

/// Which artifacts are present
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub scaler: bool,
    pub isolation_forest: bool,
    pub autoencoder: bool,
    pub classifier: bool,
    pub explainer: bool,
}

/// Loaded, read-only model artifacts
#[derive(Default)]
pub struct ModelRegistry {
    scaler: Option<Arc<dyn Scaler>>,
    outlier: Option<Arc<dyn OutlierDetector>>,
    reconstructor: Option<Arc<dyn Reconstructor>>,
    classifier: Option<Arc<dyn Classifier>>,
    explainer: Option<Arc<dyn Explainer>>,
    load_error: Option<String>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("status", &self.status())
            .field("load_error", &self.load_error)
            .finish()
    }
}

impl ModelRegistry {
    /// Empty registry; use the `with_*` builders to populate it
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every artifact from disk
    ///
    /// Never fails: the first artifact that cannot be loaded stops loading and
    /// its error is kept as the load error, leaving the engine degraded. An
    /// explainer that cannot be built is logged and skipped.
    pub fn load(paths: &ArtifactPaths) -> Self {
        info!("Loading model artifacts...");
        let mut registry = Self::new();

        if let Err(e) = registry.load_required(paths) {
            error!(error = %e, "CRITICAL: Failed to load models");
            registry.load_error = Some(e.to_string());
            return registry;
        }

        info!("All models loaded successfully");
        registry
    }

    fn load_required(&mut self, paths: &ArtifactPaths) -> Result<(), ModelError> {
        let scaler = StandardScaler::from_file(&paths.scaler)?;
        self.scaler = Some(Arc::new(scaler));
        info!(path = %paths.scaler.display(), "Scaler loaded");

        let forest = IsolationForest::from_file(&paths.isolation_forest)?;
        info!(
            path = %paths.isolation_forest.display(),
            trees = forest.n_trees(),
            "Isolation forest loaded"
        );
        self.outlier = Some(Arc::new(forest));

        let classifier = Arc::new(GradientBoostedClassifier::from_file(&paths.classifier)?);
        info!(
            path = %paths.classifier.display(),
            trees = classifier.n_trees(),
            classes = classifier.num_classes(),
            "Classifier loaded"
        );
        self.classifier = Some(classifier.clone() as Arc<dyn Classifier>);

        match TreePathExplainer::new(classifier) {
            Ok(explainer) => {
                info!("Attribution explainer loaded");
                self.explainer = Some(Arc::new(explainer));
            }
            Err(e) => warn!(error = %e, "Attribution explainer unavailable"),
        }

        let autoencoder = DenseAutoencoder::from_file(&paths.autoencoder)?;
        info!(
            path = %paths.autoencoder.display(),
            layers = autoencoder.depth(),
            "Autoencoder loaded"
        );
        self.reconstructor = Some(Arc::new(autoencoder));

        Ok(())
    }

    pub fn with_scaler(mut self, scaler: impl Scaler + 'static) -> Self {
        self.scaler = Some(Arc::new(scaler));
        self
    }

    pub fn with_outlier_detector(mut self, detector: impl OutlierDetector + 'static) -> Self {
        self.outlier = Some(Arc::new(detector));
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: impl Reconstructor + 'static) -> Self {
        self.reconstructor = Some(Arc::new(reconstructor));
        self
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn with_explainer(mut self, explainer: impl Explainer + 'static) -> Self {
        self.explainer = Some(Arc::new(explainer));
        self
    }

    /// Record a load failure (the engine stays degraded)
    pub fn with_load_error(mut self, error: impl Into<String>) -> Self {
        self.load_error = Some(error.into());
        self
    }

    pub fn scaler(&self) -> Option<&dyn Scaler> {
        self.scaler.as_deref()
    }

    pub fn outlier_detector(&self) -> Option<&dyn OutlierDetector> {
        self.outlier.as_deref()
    }

    pub fn reconstructor(&self) -> Option<&dyn Reconstructor> {
        self.reconstructor.as_deref()
    }

    pub fn classifier(&self) -> Option<&dyn Classifier> {
        self.classifier.as_deref()
    }

    pub fn explainer(&self) -> Option<&dyn Explainer> {
        self.explainer.as_deref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Liveness: the scaler artifact loaded
    pub fn models_loaded(&self) -> bool {
        self.scaler.is_some()
    }

    /// Every artifact a decision needs is present
    pub fn is_ready(&self) -> bool {
        self.scaler.is_some()
            && self.outlier.is_some()
            && self.reconstructor.is_some()
            && self.classifier.is_some()
    }

    pub fn status(&self) -> ArtifactStatus {
        ArtifactStatus {
            scaler: self.scaler.is_some(),
            isolation_forest: self.outlier.is_some(),
            autoencoder: self.reconstructor.is_some(),
            classifier: self.classifier.is_some(),
            explainer: self.explainer.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureVector, ScaledVector, FEATURE_COUNT};
    use serde_json::json;
    use std::fs;

    struct Passthrough;

    impl Scaler for Passthrough {
        fn transform(&self, vector: &FeatureVector) -> ScaledVector {
            ScaledVector::from_array(vector.values().clone())
        }
    }

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn identity_layers() -> serde_json::Value {
        let weights: Vec<Vec<f64>> = (0..FEATURE_COUNT)
            .map(|i| (0..FEATURE_COUNT).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        json!({"layers": [{
            "weights": weights,
            "bias": vec![0.0; FEATURE_COUNT],
            "activation": "linear"
        }]})
    }

    fn write_artifacts(dir: &Path, with_cover: bool) {
        write(
            dir,
            "scaler.json",
            json!({"mean": vec![0.0; FEATURE_COUNT], "scale": vec![1.0; FEATURE_COUNT]}),
        );
        write(
            dir,
            "isolation_forest.json",
            json!({"max_samples": 64, "trees": [{"nodes": [{"type": "leaf", "samples": 64}]}]}),
        );
        let cover = if with_cover { json!(10.0) } else { json!(null) };
        write(
            dir,
            "classifier.json",
            json!({"num_class": 2, "trees": [
                {"class": 1, "nodes": [
                    {"type": "split", "feature": 0, "threshold": 1.0, "left": 1, "right": 2, "cover": cover},
                    {"type": "leaf", "value": -1.0, "cover": cover},
                    {"type": "leaf", "value": 1.0, "cover": cover}
                ]}
            ]}),
        );
        write(dir, "autoencoder.json", identity_layers());
    }

    #[test]
    fn test_empty_registry_not_ready() {
        let registry = ModelRegistry::new();
        assert!(!registry.models_loaded());
        assert!(!registry.is_ready());
        assert_eq!(registry.load_error(), None);
    }

    #[test]
    fn test_builder_liveness_vs_readiness() {
        let registry = ModelRegistry::new().with_scaler(Passthrough);
        assert!(registry.models_loaded());
        assert!(!registry.is_ready());
        assert!(registry.status().scaler);
        assert!(!registry.status().classifier);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), true);

        let registry = ModelRegistry::load(&ArtifactPaths::in_dir(dir.path()));
        assert!(registry.is_ready(), "{:?}", registry.load_error());
        assert!(registry.status().explainer);
        assert_eq!(registry.load_error(), None);
    }

    #[test]
    fn test_load_without_cover_skips_explainer() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), false);

        let registry = ModelRegistry::load(&ArtifactPaths::in_dir(dir.path()));
        assert!(registry.is_ready());
        assert!(!registry.status().explainer);
    }

    #[test]
    fn test_missing_artifact_records_error_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path(), true);
        fs::remove_file(dir.path().join("isolation_forest.json")).unwrap();

        let registry = ModelRegistry::load(&ArtifactPaths::in_dir(dir.path()));
        // scaler loaded before the failure, nothing after it
        assert!(registry.models_loaded());
        assert!(!registry.is_ready());
        assert!(!registry.status().classifier);
        assert!(registry
            .load_error()
            .unwrap()
            .contains("isolation_forest.json"));
    }

    #[test]
    fn test_missing_directory() {
        let registry = ModelRegistry::load(&ArtifactPaths::in_dir("/nonexistent/models"));
        assert!(!registry.models_loaded());
        assert!(registry.load_error().is_some());
    }
}
