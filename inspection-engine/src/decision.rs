// Decision Engine
//
// Deterministic rule cascade over the three ensemble scores, plus the derived
// layers built on top of it: unified risk, enforcement action, confidence tier
// and attack-family labelling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outlier score at or above which behaviour is considered anomalous
pub const IF_HIGH: f64 = 0.05;
/// Reconstruction error at or above which behaviour is considered anomalous
pub const AE_HIGH: f64 = 0.05;
/// Attack probability at or above which a known signature is assumed
pub const XGB_HIGH: f64 = 0.5;

/// Risk above which the confidence tier is High
pub const CONFIDENCE_HIGH: f64 = 0.8;
/// Risk above which the confidence tier is Moderate
pub const CONFIDENCE_MODERATE: f64 = 0.5;
/// Risk above which a benign prediction is relabelled as a potential zero-day
pub const ZERO_DAY_RISK: f64 = 0.5;

/// Fixed decision thresholds (configuration, never learned at request time)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub if_high: f64,
    pub ae_high: f64,
    pub xgb_high: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            if_high: IF_HIGH,
            ae_high: AE_HIGH,
            xgb_high: XGB_HIGH,
        }
    }
}

/// Decision category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Normal,
    ReviewRequired,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Normal => "NORMAL",
            Decision::ReviewRequired => "REVIEW_REQUIRED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule of the cascade fired; doubles as the reason taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// IF and AE both high
    BehavioralAnomaly,
    /// Classifier confident of a known attack
    KnownSignature,
    /// IF high but AE low
    BenignBurst,
    /// Nothing fired
    NoAnomaly,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::BehavioralAnomaly => {
                "Behavioral anomaly detected (IF + AE high) → possible zero-day"
            }
            Reason::KnownSignature => "Known attack signature detected (XGBoost high confidence)",
            Reason::BenignBurst => "Benign traffic burst or noise (IF high, AE low)",
            Reason::NoAnomaly => "No behavioral or signature-based anomaly detected",
        }
    }

    /// Decision implied by this rule
    pub fn decision(&self) -> Decision {
        match self {
            Reason::BehavioralAnomaly | Reason::KnownSignature => Decision::ReviewRequired,
            Reason::BenignBurst | Reason::NoAnomaly => Decision::Normal,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Reason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Enforcement action recommended to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Allow,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Block => "BLOCK",
        }
    }
}

impl From<Decision> for Action {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::ReviewRequired => Action::Block,
            Decision::Normal => Action::Allow,
        }
    }
}

/// Confidence tier derived from the unified risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Confidence {
    Low,
    Moderate,
    High,
}

impl Confidence {
    /// Strict thresholds: exactly 0.8 is Moderate, exactly 0.5 is Low
    pub fn from_risk(risk: f64) -> Self {
        if risk > CONFIDENCE_HIGH {
            Confidence::High
        } else if risk > CONFIDENCE_MODERATE {
            Confidence::Moderate
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Moderate => "Moderate",
            Confidence::High => "High",
        }
    }
}

/// Evaluate the rule cascade; first match wins
pub fn decide(thresholds: &DecisionThresholds, if_score: f64, ae_score: f64, xgb_prob: f64) -> (Decision, Reason) {
    let if_high = if_score >= thresholds.if_high;
    let ae_high = ae_score >= thresholds.ae_high;

    let reason = if if_high && ae_high {
        Reason::BehavioralAnomaly
    } else if xgb_prob >= thresholds.xgb_high {
        Reason::KnownSignature
    } else if if_high && !ae_high {
        Reason::BenignBurst
    } else {
        Reason::NoAnomaly
    };

    (reason.decision(), reason)
}

/// Worst-signal-wins unified risk
pub fn risk_score(if_score: f64, ae_score: f64, xgb_prob: f64) -> f64 {
    if_score.max(ae_score).max(xgb_prob)
}

/// Full output of the decision layer for one score triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
    pub risk_score: f64,
    pub action: Action,
    pub confidence: Confidence,
}

/// Run the cascade and derive risk, action and confidence
pub fn evaluate(thresholds: &DecisionThresholds, if_score: f64, ae_score: f64, xgb_prob: f64) -> Verdict {
    let (decision, reason) = decide(thresholds, if_score, ae_score, xgb_prob);
    let risk_score = risk_score(if_score, ae_score, xgb_prob);
    Verdict {
        decision,
        reason,
        risk_score,
        action: Action::from(decision),
        confidence: Confidence::from_risk(risk_score),
    }
}

/// Known attack families by classifier label
pub fn attack_family(class: usize) -> &'static str {
    match class {
        0 => "Benign / Background",
        1 => "Botnet",
        2 => "DDoS",
        3 => "SQL Injection",
        4 => "PortScan",
        5 => "Brute Force",
        _ => "Unknown",
    }
}

/// Attack-type label shown to operators
///
/// A benign prediction with high ensemble risk is the disagreement signal
/// between the classifier and the behavioural models.
pub fn attack_label(pred_class: usize, risk: f64) -> &'static str {
    if pred_class == 0 && risk > ZERO_DAY_RISK {
        "Potential Zero-Day (Anomaly)"
    } else {
        attack_family(pred_class)
    }
}
