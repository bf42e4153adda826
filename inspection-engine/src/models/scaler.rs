// Standardizing scaler: (x - mean) / scale

use ndarray::Array1;
use serde::Deserialize;
use std::path::Path;

use super::{read_artifact, Scaler};
use crate::error::ModelError;
use crate::features::{FeatureVector, ScaledVector, FEATURE_COUNT};

#[derive(Debug, Deserialize)]
struct ScalerArtifact {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Per-feature standardization fitted offline on benign traffic
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Build from fitted parameters. A zero scale is treated as 1.0, matching
    /// how constant columns are handled at fit time.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != FEATURE_COUNT || scale.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "scaler expects {} means and scales, got {} and {}",
                FEATURE_COUNT,
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid(
                "scaler parameters must be finite".to_string(),
            ));
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Load from a JSON artifact (`{"mean": [...], "scale": [...]}`)
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let artifact: ScalerArtifact = read_artifact(path)?;
        Self::new(artifact.mean, artifact.scale)
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, vector: &FeatureVector) -> ScaledVector {
        ScaledVector::from_array((vector.values() - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_transform_standardizes() {
        let mut mean = vec![0.0; FEATURE_COUNT];
        let mut scale = vec![1.0; FEATURE_COUNT];
        mean[0] = 10.0;
        scale[0] = 2.0;
        scale[1] = 0.0;

        let scaler = StandardScaler::new(mean, scale).unwrap();
        let mut raw = vec![0.0; FEATURE_COUNT];
        raw[0] = 14.0;
        raw[1] = 5.0;
        let scaled = scaler.transform(&FeatureVector::from_array(Array1::from(raw)));

        assert_eq!(scaled.get(0), Some(2.0));
        // zero scale falls back to 1.0
        assert_eq!(scaled.get(1), Some(5.0));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let err = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let artifact = serde_json::json!({
            "mean": vec![1.0; FEATURE_COUNT],
            "scale": vec![0.5; FEATURE_COUNT],
        });
        write!(file, "{}", artifact).unwrap();

        let scaler = StandardScaler::from_file(file.path()).unwrap();
        let scaled = scaler.transform(&FeatureVector::from_array(Array1::from(vec![
            2.0;
            FEATURE_COUNT
        ])));
        assert!(scaled.values().iter().all(|v| (*v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_from_missing_file() {
        let err = StandardScaler::from_file(Path::new("/nonexistent/scaler.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
