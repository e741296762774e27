use super::{Classifier, argmax_class, check_width, default_classes, sigmoid, softmax};
use crate::error::ModelError;
use serde::Deserialize;

/// A node in a flattened decision tree. Children are indices into the
/// owning tree's node list; node 0 is the root.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Clone, Copy)]
enum SplitRule {
    /// `x < threshold` goes left (boosted trees).
    Less,
    /// `x <= threshold` goes left (forest trees).
    LessOrEqual,
}

impl Tree {
    fn validate(&self, n_features: usize, leaf_width: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::invalid("tree has no nodes"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(ModelError::invalid(format!(
                            "node {i} splits on feature {feature} of {n_features}"
                        )));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(ModelError::invalid(format!("node {i} has a dangling child")));
                    }
                }
                TreeNode::Leaf { leaf } => {
                    if leaf.len() != leaf_width {
                        return Err(ModelError::invalid(format!(
                            "leaf {i} has {} values, expected {leaf_width}",
                            leaf.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &[f64], rule: SplitRule) -> Result<&[f64], ModelError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return Ok(leaf),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features[*feature];
                    let go_left = match rule {
                        SplitRule::Less => x < *threshold,
                        SplitRule::LessOrEqual => x <= *threshold,
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
        Err(ModelError::invalid("tree contains a cycle"))
    }
}

/// Gradient-boosted tree ensemble with logistic (binary) or softmax
/// (multiclass) objective. For `k > 2` classes tree `i` contributes to class
/// `i % k`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoostedModel {
    pub n_features: usize,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl GradientBoostedModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.classes.len() < 2 {
            return Err(ModelError::invalid("boosted model needs at least two classes"));
        }
        if self.trees.is_empty() {
            return Err(ModelError::invalid("boosted model has no trees"));
        }
        self.trees
            .iter()
            .try_for_each(|t| t.validate(self.n_features, 1))
    }

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, features)?;
        let groups = if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        };
        let mut margins = vec![self.base_score; groups];
        for (i, tree) in self.trees.iter().enumerate() {
            margins[i % groups] += tree.evaluate(features, SplitRule::Less)?[0];
        }
        if groups == 1 {
            let p = sigmoid(margins[0]);
            Ok(vec![1.0 - p, p])
        } else {
            Ok(softmax(&margins))
        }
    }
}

impl Classifier for GradientBoostedModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        let proba = self.probabilities(features)?;
        argmax_class(&self.classes, &proba)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, ModelError> {
        self.probabilities(features).map(Some)
    }
}

/// Random forest: leaves hold per-class weights, averaged across trees.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::invalid("forest has no trees"));
        }
        self.trees
            .iter()
            .try_for_each(|t| t.validate(self.n_features, self.classes.len()))
    }

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, features)?;
        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.evaluate(features, SplitRule::LessOrEqual)?;
            let weight: f64 = leaf.iter().sum();
            if weight <= 0.0 {
                continue;
            }
            for (total, value) in totals.iter_mut().zip(leaf) {
                *total += value / weight;
            }
        }
        let n = self.trees.len() as f64;
        Ok(totals.into_iter().map(|t| t / n).collect())
    }
}

impl Classifier for ForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        let proba = self.probabilities(features)?;
        argmax_class(&self.classes, &proba)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, ModelError> {
        self.probabilities(features).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelArtifact;

    fn stump(feature: usize, threshold: f64, left: Vec<f64>, right: Vec<f64>) -> Tree {
        Tree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { leaf: left },
                TreeNode::Leaf { leaf: right },
            ],
        }
    }

    #[test]
    fn boosted_binary_sums_margins() {
        let model = GradientBoostedModel {
            n_features: 1,
            classes: vec![0, 1],
            base_score: 0.0,
            trees: vec![
                stump(0, 30.0, vec![-1.0], vec![1.0]),
                stump(0, 40.0, vec![-0.5], vec![0.5]),
            ],
        };
        model.validate().unwrap();
        assert_eq!(model.predict(&[45.0]).unwrap(), 1);
        assert_eq!(model.predict(&[20.0]).unwrap(), 0);
        let proba = model.predict_proba(&[35.0]).unwrap().unwrap();
        assert!((proba[1] - sigmoid(0.5)).abs() < 1e-12);
    }

    #[test]
    fn boosted_split_is_strict() {
        let model = GradientBoostedModel {
            n_features: 1,
            classes: vec![0, 1],
            base_score: 0.0,
            trees: vec![stump(0, 30.0, vec![-1.0], vec![1.0])],
        };
        // Exactly on the threshold goes right.
        assert_eq!(model.predict(&[30.0]).unwrap(), 1);
    }

    #[test]
    fn boosted_multiclass_round_robins_trees() {
        let model = GradientBoostedModel {
            n_features: 1,
            classes: vec![0, 1, 2],
            base_score: 0.5,
            trees: vec![
                stump(0, 10.0, vec![2.0], vec![0.0]),
                stump(0, 10.0, vec![0.0], vec![0.0]),
                stump(0, 10.0, vec![0.0], vec![2.0]),
            ],
        };
        model.validate().unwrap();
        assert_eq!(model.predict(&[5.0]).unwrap(), 0);
        assert_eq!(model.predict(&[15.0]).unwrap(), 2);
    }

    #[test]
    fn forest_averages_normalized_leaves() {
        let model = ForestModel {
            n_features: 2,
            classes: vec![0, 1],
            trees: vec![
                stump(0, 100.0, vec![8.0, 2.0], vec![1.0, 3.0]),
                stump(1, 0.5, vec![1.0, 1.0], vec![0.0, 5.0]),
            ],
        };
        model.validate().unwrap();
        let proba = model.predict_proba(&[100.0, 1.0]).unwrap().unwrap();
        // (0.8 + 0.0) / 2, (0.2 + 1.0) / 2
        assert!((proba[0] - 0.4).abs() < 1e-12);
        assert!((proba[1] - 0.6).abs() < 1e-12);
        assert_eq!(model.predict(&[100.0, 1.0]).unwrap(), 1);
    }

    #[test]
    fn dangling_child_fails_validation() {
        let tree = Tree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 1,
                right: 9,
            }],
        };
        assert!(tree.validate(1, 1).is_err());
    }

    #[test]
    fn parses_flattened_json() {
        let artifact = ModelArtifact::from_json(
            r#"{
                "kind": "random_forest",
                "n_features": 1,
                "trees": [{"nodes": [
                    {"feature": 0, "threshold": 0.0, "left": 1, "right": 2},
                    {"leaf": [1.0, 0.0]},
                    {"leaf": [0.0, 1.0]}
                ]}]
            }"#,
        )
        .unwrap();
        assert_eq!(artifact.predict(&[1.0]).unwrap(), 1);
    }
}
