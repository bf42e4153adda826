// Explainability Module
//
// Best-effort per-feature attribution for high-risk flows. Gated on the
// unified risk score; any fault degrades to an empty attribution.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::features::{ScaledVector, FEATURE_NAMES};
use crate::models::{argmax, Explainer};
use crate::scoring::elapsed_ms;

/// Risk above which attributions are computed
pub const EXPLAIN_THRESHOLD: f64 = 0.3;
/// Maximum number of attributions reported
pub const TOP_K: usize = 5;

/// Explainability gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainSettings {
    pub enabled: bool,
    pub risk_threshold: f64,
    pub top_k: usize,
}

impl Default for ExplainSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_threshold: EXPLAIN_THRESHOLD,
            top_k: TOP_K,
        }
    }
}

/// Strength of a contribution relative to the strongest one reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImpactLabel {
    #[serde(rename = "Very High Impact")]
    VeryHigh,
    #[serde(rename = "High Impact")]
    High,
    #[serde(rename = "Moderate Impact")]
    Moderate,
}

impl ImpactLabel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.75 {
            ImpactLabel::VeryHigh
        } else if ratio > 0.4 {
            ImpactLabel::High
        } else {
            ImpactLabel::Moderate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLabel::VeryHigh => "Very High Impact",
            ImpactLabel::High => "High Impact",
            ImpactLabel::Moderate => "Moderate Impact",
        }
    }
}

/// One feature pushing the classifier toward the explained attack class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub feature: &'static str,
    pub impact_label: ImpactLabel,
    /// Scaled value of the feature
    pub value: f64,
    /// Strictly positive contribution
    pub shap_value: f64,
}

/// Attributions plus the time spent computing them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Explanation {
    pub attributions: Vec<Attribution>,
    /// 0 when skipped or faulted
    pub shap_ms: f64,
}

/// Class to explain: the predicted one, or the likeliest attack class when
/// the prediction is benign
pub fn target_class(pred_class: usize, probabilities: &[f64]) -> usize {
    if pred_class != 0 {
        return pred_class;
    }
    probabilities
        .get(1..)
        .and_then(argmax)
        .map(|i| i + 1)
        .unwrap_or(1)
}

/// Keep strictly positive contributions, strongest first, at most `top_k`
pub fn rank(vector: &ScaledVector, contributions: &[f64], top_k: usize) -> Vec<Attribution> {
    let mut positive: Vec<(usize, f64)> = contributions
        .iter()
        .copied()
        .enumerate()
        .take(FEATURE_NAMES.len())
        .filter(|(_, c)| *c > 0.0)
        .collect();
    positive.sort_by(|a, b| b.1.total_cmp(&a.1));
    positive.truncate(top_k);

    let strongest = match positive.first() {
        Some((_, c)) => *c,
        None => return Vec::new(),
    };

    positive
        .into_iter()
        .map(|(i, shap_value)| Attribution {
            feature: FEATURE_NAMES[i],
            impact_label: ImpactLabel::from_ratio(shap_value / strongest),
            value: vector.get(i).unwrap_or(0.0),
            shap_value,
        })
        .collect()
}

/// Explain a scored flow, if it is risky enough and an explainer is loaded
pub fn explain(
    settings: &ExplainSettings,
    explainer: Option<&dyn Explainer>,
    vector: &ScaledVector,
    risk_score: f64,
    pred_class: usize,
    probabilities: &[f64],
) -> Explanation {
    let explainer = match explainer {
        Some(explainer) if settings.enabled && risk_score > settings.risk_threshold => explainer,
        _ => return Explanation::default(),
    };

    let start = Instant::now();
    let class = target_class(pred_class, probabilities);

    match explainer.attributions(vector, class) {
        Ok(contributions) => {
            let attributions = rank(vector, &contributions, settings.top_k);
            let shap_ms = elapsed_ms(start);
            debug!(class, reported = attributions.len(), shap_ms, "Attributions computed");
            Explanation {
                attributions,
                shap_ms,
            }
        }
        Err(e) => {
            warn!(error = %e, class, "Attribution failed, returning empty explanation");
            metrics::counter!("inspection_explain_failures_total", 1);
            Explanation::default()
        }
    }
}
