//! Pre-trained model artifacts.
//!
//! Each model role sits behind a trait so the engine can be driven by the
//! JSON-exported artifacts in production and by stubs in tests. Artifacts are
//! loaded once into a [`ModelRegistry`] and never mutated afterwards.

pub mod autoencoder;
pub mod boosting;
pub mod isolation;
pub mod registry;
pub mod scaler;

use crate::error::ModelError;
use crate::features::{FeatureVector, ScaledVector};
use serde::de::DeserializeOwned;
use std::path::Path;

pub use autoencoder::DenseAutoencoder;
pub use boosting::{GradientBoostedClassifier, TreePathExplainer};
pub use isolation::IsolationForest;
pub use registry::{ArtifactPaths, ArtifactStatus, ModelRegistry};
pub use scaler::StandardScaler;

/// Fitted scaling transform
pub trait Scaler: Send + Sync {
    fn transform(&self, vector: &FeatureVector) -> ScaledVector;
}

/// Unsupervised outlier detector
pub trait OutlierDetector: Send + Sync {
    /// Native decision function: positive = inlier, negative = outlier
    fn decision_function(&self, vector: &ScaledVector) -> Result<f64, ModelError>;
}

/// Model that reproduces its input (trained on benign traffic only)
pub trait Reconstructor: Send + Sync {
    /// Pure forward pass; must not update any state
    fn reconstruct(&self, vector: &ScaledVector) -> Result<ScaledVector, ModelError>;
}

/// Multi-class supervised classifier; class 0 is benign
pub trait Classifier: Send + Sync {
    fn num_classes(&self) -> usize;

    /// Per-class probabilities, summing to 1
    fn predict_proba(&self, vector: &ScaledVector) -> Result<Vec<f64>, ModelError>;
}

/// Per-feature attribution for one class of the supervised classifier
pub trait Explainer: Send + Sync {
    /// Signed contribution of every feature toward `class`
    fn attributions(&self, vector: &ScaledVector, class: usize) -> Result<Vec<f64>, ModelError>;
}

/// Index of the largest value; first one wins on ties
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Read and deserialize a JSON artifact
pub(crate) fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ModelError::Parse {
        path: display,
        source,
    })
}

/// Reject vectors whose width differs from what the model was trained on
pub(crate) fn check_width(expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected != actual {
        return Err(ModelError::Dimension { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax(&[0.0, 0.0, 0.9]), Some(2));
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(40, 40).is_ok());
        assert!(matches!(
            check_width(40, 3),
            Err(ModelError::Dimension { expected: 40, actual: 3 })
        ));
    }
}
