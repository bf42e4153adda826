// Gradient-boosted tree classifier (softmax objective) and its attribution explainer
//
// Each boosting round contributes one regression tree per class. Class margins
// are the base score plus the sum of the leaves reached in that class's trees,
// and probabilities are the softmax of the margins.
//
// The explainer walks the same decision paths and credits every split's
// feature with the change in the cover-weighted expected value between the
// node and the child taken. Per tree the credits sum to leaf value minus root
// expectation, so the attributions add up to the class margin minus its bias.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::{check_width, read_artifact, Classifier, Explainer};
use crate::error::ModelError;
use crate::features::{ScaledVector, FEATURE_COUNT};

/// Node of a boosted regression tree
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoostedNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Branch taken when the feature value is missing (NaN)
        #[serde(default)]
        default_left: bool,
        #[serde(default)]
        cover: Option<f64>,
    },
    Leaf {
        value: f64,
        #[serde(default)]
        cover: Option<f64>,
    },
}

impl BoostedNode {
    fn cover(&self) -> Option<f64> {
        match self {
            BoostedNode::Split { cover, .. } | BoostedNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree; node 0 is the root
#[derive(Debug, Clone, Deserialize)]
pub struct BoostedTree {
    /// Class whose margin this tree contributes to
    pub class: usize,
    pub nodes: Vec<BoostedNode>,
}

impl BoostedTree {
    fn validate(&self, index: usize, num_class: usize) -> Result<(), ModelError> {
        if self.class >= num_class {
            return Err(ModelError::Invalid(format!(
                "tree {index} targets class {} but the model has {num_class} classes",
                self.class
            )));
        }
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {index} is empty")));
        }
        for node in &self.nodes {
            if let BoostedNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= FEATURE_COUNT {
                    return Err(ModelError::Invalid(format!(
                        "tree {index} splits on unknown feature {feature}"
                    )));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(ModelError::Invalid(format!(
                        "tree {index} references a node out of range"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Indices of the nodes visited from the root to the leaf
    fn decision_path(&self, x: &ScaledVector) -> Result<Vec<usize>, ModelError> {
        let mut path = vec![0];
        let mut index = 0;
        while let BoostedNode::Split {
            feature,
            threshold,
            left,
            right,
            default_left,
            ..
        } = &self.nodes[index]
        {
            let value = x.get(*feature).unwrap_or(f64::NAN);
            index = if value.is_nan() {
                if *default_left {
                    *left
                } else {
                    *right
                }
            } else if value < *threshold {
                *left
            } else {
                *right
            };
            path.push(index);
            if path.len() > self.nodes.len() {
                return Err(ModelError::Invalid("cycle detected in boosted tree".to_string()));
            }
        }
        Ok(path)
    }

    fn leaf_value(&self, x: &ScaledVector) -> Result<f64, ModelError> {
        let path = self.decision_path(x)?;
        match path.last().map(|&i| &self.nodes[i]) {
            Some(BoostedNode::Leaf { value, .. }) => Ok(*value),
            _ => Err(ModelError::Invalid("decision path did not end on a leaf".to_string())),
        }
    }

    /// Cover-weighted expected value of every node, computed bottom-up
    fn expected_values(&self) -> Result<Vec<f64>, ModelError> {
        let mut values = vec![None; self.nodes.len()];
        for root in 0..self.nodes.len() {
            self.expected_value(root, &mut values, 0)?;
        }
        Ok(values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    }

    fn expected_value(&self, index: usize, memo: &mut Vec<Option<f64>>, depth: usize) -> Result<f64, ModelError> {
        if let Some(value) = memo[index] {
            return Ok(value);
        }
        if depth > self.nodes.len() {
            return Err(ModelError::Invalid("cycle detected in boosted tree".to_string()));
        }
        let value = match &self.nodes[index] {
            BoostedNode::Leaf { value, .. } => *value,
            BoostedNode::Split { left, right, .. } => {
                let cover = |i: usize| {
                    self.nodes[i].cover().ok_or_else(|| {
                        ModelError::Incompatible("tree nodes carry no cover statistics".to_string())
                    })
                };
                let (left_cover, right_cover) = (cover(*left)?, cover(*right)?);
                let total = left_cover + right_cover;
                if total <= 0.0 {
                    return Err(ModelError::Incompatible(
                        "split with zero total cover".to_string(),
                    ));
                }
                let left_value = self.expected_value(*left, memo, depth + 1)?;
                let right_value = self.expected_value(*right, memo, depth + 1)?;
                (left_cover * left_value + right_cover * right_value) / total
            }
        };
        memo[index] = Some(value);
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierArtifact {
    num_class: usize,
    #[serde(default)]
    base_score: f64,
    trees: Vec<BoostedTree>,
}

/// Multi-class boosted tree ensemble
#[derive(Debug, Clone)]
pub struct GradientBoostedClassifier {
    num_class: usize,
    base_score: f64,
    trees: Vec<BoostedTree>,
}

impl GradientBoostedClassifier {
    pub fn new(num_class: usize, base_score: f64, trees: Vec<BoostedTree>) -> Result<Self, ModelError> {
        if num_class < 2 {
            return Err(ModelError::Invalid(format!(
                "classifier needs at least 2 classes, got {num_class}"
            )));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i, num_class)?;
        }
        Ok(Self {
            num_class,
            base_score,
            trees,
        })
    }

    /// Load from a JSON artifact
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let artifact: ClassifierArtifact = read_artifact(path)?;
        Self::new(artifact.num_class, artifact.base_score, artifact.trees)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw per-class margins before softmax
    pub fn margins(&self, x: &ScaledVector) -> Result<Vec<f64>, ModelError> {
        check_width(FEATURE_COUNT, x.len())?;
        let mut margins = vec![self.base_score; self.num_class];
        for tree in &self.trees {
            margins[tree.class] += tree.leaf_value(x)?;
        }
        Ok(margins)
    }
}

/// Numerically stable softmax
pub fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl Classifier for GradientBoostedClassifier {
    fn num_classes(&self) -> usize {
        self.num_class
    }

    fn predict_proba(&self, vector: &ScaledVector) -> Result<Vec<f64>, ModelError> {
        Ok(softmax(&self.margins(vector)?))
    }
}

/// Decision-path attribution explainer over a boosted classifier
#[derive(Debug, Clone)]
pub struct TreePathExplainer {
    model: Arc<GradientBoostedClassifier>,
    /// Expected value per node, per tree
    node_values: Vec<Vec<f64>>,
}

impl TreePathExplainer {
    /// Fails with [`ModelError::Incompatible`] when the trees lack cover statistics
    pub fn new(model: Arc<GradientBoostedClassifier>) -> Result<Self, ModelError> {
        let node_values = model
            .trees
            .iter()
            .map(BoostedTree::expected_values)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { model, node_values })
    }

    /// Expected margin of `class` before any feature is observed
    pub fn expected_value(&self, class: usize) -> f64 {
        self.model
            .trees
            .iter()
            .zip(&self.node_values)
            .filter(|(tree, _)| tree.class == class)
            .map(|(_, values)| values[0])
            .sum::<f64>()
            + self.model.base_score
    }
}

impl Explainer for TreePathExplainer {
    fn attributions(&self, vector: &ScaledVector, class: usize) -> Result<Vec<f64>, ModelError> {
        check_width(FEATURE_COUNT, vector.len())?;
        if class >= self.model.num_class {
            return Err(ModelError::Incompatible(format!(
                "class {class} is outside the model's {} classes",
                self.model.num_class
            )));
        }

        let mut contributions = vec![0.0; FEATURE_COUNT];
        for (tree, values) in self.model.trees.iter().zip(&self.node_values) {
            if tree.class != class {
                continue;
            }
            let path = tree.decision_path(vector)?;
            for step in path.windows(2) {
                let (parent, child) = (step[0], step[1]);
                if let BoostedNode::Split { feature, .. } = &tree.nodes[parent] {
                    contributions[*feature] += values[child] - values[parent];
                }
            }
        }
        Ok(contributions)
    }
}
