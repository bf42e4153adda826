// Isolation Forest outlier detector
//
// Scores a sample by how quickly random axis-aligned splits isolate it:
// anomalies sit on short paths. The native decision function follows the
// usual convention (positive = inlier, negative = outlier); the scorer flips
// the sign so that higher = more anomalous.

use serde::Deserialize;
use std::path::Path;

use super::{check_width, read_artifact, OutlierDetector};
use crate::error::ModelError;
use crate::features::{ScaledVector, FEATURE_COUNT};

/// Euler-Mascheroni constant, used to approximate harmonic numbers
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Default offset for "auto" contamination
pub const DEFAULT_OFFSET: f64 = -0.5;

/// Node of an isolation tree
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Training samples that reached this leaf
        samples: usize,
    },
}

/// Single isolation tree; node 0 is the root
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<IsolationNode>,
}

#[derive(Debug, Deserialize)]
struct IsolationForestArtifact {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    #[serde(default = "default_offset")]
    offset: f64,
}

fn default_offset() -> f64 {
    DEFAULT_OFFSET
}

/// Trained isolation forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    offset: f64,
}

/// Average path length of an unsuccessful BST search over `n` samples
///
/// c(n) = 2H(n-1) - 2(n-1)/n, with c(1) = 0 and c(2) = 1
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationTree {
    fn validate(&self, index: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("isolation tree {index} is empty")));
        }
        for node in &self.nodes {
            if let IsolationNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= FEATURE_COUNT {
                    return Err(ModelError::Invalid(format!(
                        "isolation tree {index} splits on unknown feature {feature}"
                    )));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(ModelError::Invalid(format!(
                        "isolation tree {index} references a node out of range"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Depth of the leaf reached plus the expected remaining depth below it
    fn path_length(&self, x: &ScaledVector) -> Result<f64, ModelError> {
        let mut index = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[index] {
                IsolationNode::Leaf { samples } => {
                    return Ok(depth as f64 + average_path_length(*samples));
                }
                IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = x.get(*feature).unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                    depth += 1;
                    if depth > self.nodes.len() {
                        return Err(ModelError::Invalid(
                            "cycle detected in isolation tree".to_string(),
                        ));
                    }
                }
            }
        }
    }
}

impl IsolationForest {
    pub fn new(trees: Vec<IsolationTree>, max_samples: usize, offset: f64) -> Result<Self, ModelError> {
        if trees.is_empty() {
            return Err(ModelError::Invalid("isolation forest has no trees".to_string()));
        }
        if max_samples < 2 {
            return Err(ModelError::Invalid(format!(
                "max_samples must be at least 2, got {max_samples}"
            )));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i)?;
        }
        Ok(Self {
            trees,
            max_samples,
            offset,
        })
    }

    /// Load from a JSON artifact
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let artifact: IsolationForestArtifact = read_artifact(path)?;
        Self::new(artifact.trees, artifact.max_samples, artifact.offset)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Anomaly score s(x) = 2^(-E[h(x)] / c(max_samples)), in (0, 1]
    pub fn anomaly_score(&self, x: &ScaledVector) -> Result<f64, ModelError> {
        check_width(FEATURE_COUNT, x.len())?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.path_length(x)?;
        }
        let mean_depth = total / self.trees.len() as f64;
        Ok(2f64.powf(-mean_depth / average_path_length(self.max_samples)))
    }
}

impl OutlierDetector for IsolationForest {
    fn decision_function(&self, vector: &ScaledVector) -> Result<f64, ModelError> {
        Ok(-self.anomaly_score(vector)? - self.offset)
    }
}
