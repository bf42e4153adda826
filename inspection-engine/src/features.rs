// Feature Normalizer
//
// Maps the loosely-typed `features` mapping of an inspection request onto the
// fixed-order numeric vector the trained artifacts expect, then applies the
// fitted scaling transform.

use ndarray::Array1;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::Scaler;

/// Canonical feature names, in the column order used at training time.
///
/// Order matters! Must be consistent across training and inference.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Flow Duration",
    "Flow Bytes/s",
    "Flow Packets/s",
    "Down/Up Ratio",
    "Total Fwd Packets",
    "Total Backward Packets",
    "Fwd Packets/s",
    "Bwd Packets/s",
    "Min Packet Length",
    "Max Packet Length",
    "Packet Length Mean",
    "Packet Length Std",
    "Fwd Packet Length Mean",
    "Fwd Packet Length Std",
    "Bwd Packet Length Mean",
    "Bwd Packet Length Std",
    "Flow IAT Mean",
    "Flow IAT Std",
    "Flow IAT Max",
    "Fwd IAT Mean",
    "Fwd IAT Std",
    "Bwd IAT Mean",
    "Bwd IAT Std",
    "SYN Flag Count",
    "ACK Flag Count",
    "RST Flag Count",
    "PSH Flag Count",
    "Fwd Header Length",
    "Bwd Header Length",
    "Avg Fwd Segment Size",
    "Avg Bwd Segment Size",
    "Active Mean",
    "Idle Mean",
    "Packet Rate Intensity",
    "Byte Efficiency Ratio",
    "Directional Asymmetry Score",
    "Flag Aggression Index",
    "Burstiness Score",
    "Packet Size Variance Ratio",
    "Flow Stability Index",
];

/// Number of features in the vector
pub const FEATURE_COUNT: usize = 40;

/// Raw request payload: feature name -> arbitrary JSON scalar
pub type RawFeatures = HashMap<String, Value>;

/// Why a feature fell back to 0.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    /// Key absent from the request
    Missing,
    /// Present but not coercible to a finite real number
    Malformed,
}

/// A feature that was replaced by the default value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultedFeature {
    pub feature: &'static str,
    pub reason: DefaultReason,
}

/// Unscaled feature vector in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

/// Feature vector after the fitted scaling transform
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVector(Array1<f64>);

macro_rules! vector_accessors {
    ($ty:ident) => {
        impl $ty {
            /// Wrap an already-ordered array
            pub fn from_array(values: Array1<f64>) -> Self {
                Self(values)
            }

            pub fn values(&self) -> &Array1<f64> {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn get(&self, index: usize) -> Option<f64> {
                self.0.get(index).copied()
            }
        }
    };
}

vector_accessors!(FeatureVector);
vector_accessors!(ScaledVector);

/// Output of the normalizer
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub raw: FeatureVector,
    pub scaled: ScaledVector,
    /// Features that fell back to 0.0; informational only
    pub defaulted: Vec<DefaultedFeature>,
}

/// Coerce an arbitrary JSON value into a finite real number
///
/// Numbers pass through, strings are trimmed and parsed, booleans map to
/// 1.0/0.0. Everything else (null, arrays, objects, junk, NaN/inf) is `None`.
pub fn coerce_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Build the canonical feature vector, substituting 0.0 for missing or malformed fields
pub fn assemble(raw: &RawFeatures) -> (FeatureVector, Vec<DefaultedFeature>) {
    let mut defaulted = Vec::new();
    let values: Vec<f64> = FEATURE_NAMES
        .iter()
        .map(|&name| match raw.get(name) {
            None => {
                defaulted.push(DefaultedFeature {
                    feature: name,
                    reason: DefaultReason::Missing,
                });
                0.0
            }
            Some(value) => coerce_value(value).unwrap_or_else(|| {
                defaulted.push(DefaultedFeature {
                    feature: name,
                    reason: DefaultReason::Malformed,
                });
                0.0
            }),
        })
        .collect();

    (FeatureVector(Array1::from(values)), defaulted)
}

/// Normalize a raw request payload into raw and scaled vectors
///
/// Never fails for per-field problems. When `scaler` is `None` the raw vector
/// is passed through unscaled and the fallback is logged.
pub fn normalize(raw: &RawFeatures, scaler: Option<&dyn Scaler>) -> NormalizedInput {
    let (vector, defaulted) = assemble(raw);

    if !defaulted.is_empty() {
        debug!(
            defaulted = defaulted.len(),
            "Substituted 0.0 for missing or malformed features"
        );
    }

    let scaled = match scaler {
        Some(scaler) => scaler.transform(&vector),
        None => {
            warn!("No scaler loaded - passing raw features through unscaled");
            ScaledVector(vector.0.clone())
        }
    };

    NormalizedInput {
        raw: vector,
        scaled,
        defaulted,
    }
}
