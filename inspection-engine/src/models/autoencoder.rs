// Dense autoencoder used for reconstruction-error scoring
//
// Inference only: a plain forward pass through fully-connected layers with no
// dropout, batch statistics or any other training-time behaviour.

use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::path::Path;

use super::{check_width, read_artifact, Reconstructor};
use crate::error::ModelError;
use crate::features::{ScaledVector, FEATURE_COUNT};

/// Layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerArtifact {
    /// Kernel in `[inputs][outputs]` layout
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct AutoencoderArtifact {
    layers: Vec<LayerArtifact>,
}

/// Fully-connected layer: y = act(x · W + b)
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(weights: Array2<f64>, bias: Array1<f64>, activation: Activation) -> Result<Self, ModelError> {
        if weights.ncols() != bias.len() {
            return Err(ModelError::Invalid(format!(
                "layer has {} outputs but {} biases",
                weights.ncols(),
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        let activation = self.activation;
        (x.dot(&self.weights) + &self.bias).mapv_into(|v| activation.apply(v))
    }
}

/// Stack of dense layers mapping the feature vector back onto itself
#[derive(Debug, Clone)]
pub struct DenseAutoencoder {
    layers: Vec<DenseLayer>,
}

impl DenseAutoencoder {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ModelError> {
        let (first, last) = match (layers.first(), layers.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ModelError::Invalid("autoencoder has no layers".to_string())),
        };
        if first.inputs() != FEATURE_COUNT || last.outputs() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "autoencoder must map {} features onto {}, got {} -> {}",
                FEATURE_COUNT,
                FEATURE_COUNT,
                first.inputs(),
                last.outputs()
            )));
        }
        for pair in layers.windows(2) {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(ModelError::Invalid(format!(
                    "layer width mismatch: {} outputs feed {} inputs",
                    pair[0].outputs(),
                    pair[1].inputs()
                )));
            }
        }
        Ok(Self { layers })
    }

    /// Load from a JSON artifact
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let artifact: AutoencoderArtifact = read_artifact(path)?;
        let layers = artifact
            .layers
            .into_iter()
            .map(|layer| {
                let rows = layer.weights.len();
                let cols = layer.weights.first().map(Vec::len).unwrap_or(0);
                if layer.weights.iter().any(|row| row.len() != cols) {
                    return Err(ModelError::Invalid("ragged weight matrix".to_string()));
                }
                let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((rows, cols), flat)
                    .map_err(|e| ModelError::Invalid(e.to_string()))?;
                DenseLayer::new(weights, Array1::from(layer.bias), layer.activation)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layers)
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl Reconstructor for DenseAutoencoder {
    fn reconstruct(&self, vector: &ScaledVector) -> Result<ScaledVector, ModelError> {
        check_width(FEATURE_COUNT, vector.len())?;
        let output = self
            .layers
            .iter()
            .fold(vector.values().clone(), |x, layer| layer.forward(&x));
        Ok(ScaledVector::from_array(output))
    }
}

/// Mean squared error between an input and its reconstruction
pub fn reconstruction_error(input: &ScaledVector, reconstruction: &ScaledVector) -> Result<f64, ModelError> {
    check_width(input.len(), reconstruction.len())?;
    if input.is_empty() {
        return Ok(0.0);
    }
    let diff = input.values() - reconstruction.values();
    Ok(diff.mapv(|d| d * d).sum() / input.len() as f64)
}
