//! Serialized classifiers and feature scalers.
//!
//! Artifacts are JSON documents exported from the training notebooks. Each
//! document carries a `kind` tag selecting the evaluator:
//!
//! ```json
//! {"kind": "logistic", "classes": [0, 1], "coefficients": [[0.8, -1.2]], "intercepts": [0.1]}
//! ```

mod linear;
mod scaler;
mod tree;

use crate::error::ModelError;
use serde::Deserialize;
use std::path::Path;

pub use linear::{LogisticModel, ThresholdModel};
pub use scaler::Scaler;
pub use tree::{ForestModel, GradientBoostedModel, Tree, TreeNode};

/// A trained classifier over a fixed-width feature vector.
pub trait Classifier: Send + Sync {
    /// Number of inputs the model was trained on.
    fn n_features(&self) -> usize;

    /// Predicted class label.
    fn predict(&self, features: &[f64]) -> Result<i64, ModelError>;

    /// Per-class probabilities, when the model provides them.
    fn predict_proba(&self, _features: &[f64]) -> Result<Option<Vec<f64>>, ModelError> {
        Ok(None)
    }
}

/// On-disk model description.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    GradientBoosted(GradientBoostedModel),
    RandomForest(ForestModel),
    Threshold(ThresholdModel),
}

impl ModelArtifact {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact =
            serde_json::from_str(json).map_err(|e| ModelError::invalid(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact =
            serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelArtifact::Logistic(m) => m.validate(),
            ModelArtifact::GradientBoosted(m) => m.validate(),
            ModelArtifact::RandomForest(m) => m.validate(),
            ModelArtifact::Threshold(m) => m.validate(),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ModelArtifact::Logistic(m) => m,
            ModelArtifact::GradientBoosted(m) => m,
            ModelArtifact::RandomForest(m) => m,
            ModelArtifact::Threshold(m) => m,
        }
    }
}

impl Classifier for ModelArtifact {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        self.inner().predict(features)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, ModelError> {
        self.inner().predict_proba(features)
    }
}

pub(crate) fn default_classes() -> Vec<i64> {
    vec![0, 1]
}

pub(crate) fn check_width(expected: usize, features: &[f64]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::feature_count(expected, features.len()));
    }
    Ok(())
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Class label at the highest probability. Ties go to the lower index.
pub(crate) fn argmax_class(classes: &[i64], proba: &[f64]) -> Result<i64, ModelError> {
    let mut best = 0;
    for (i, p) in proba.iter().enumerate() {
        if *p > proba[best] {
            best = i;
        }
    }
    classes
        .get(best)
        .copied()
        .ok_or_else(|| ModelError::invalid("class list shorter than probability vector"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_kind_tag() {
        let artifact = ModelArtifact::from_json(
            r#"{"kind": "logistic", "coefficients": [[1.0, -1.0]], "intercepts": [0.0]}"#,
        )
        .unwrap();
        assert!(matches!(artifact, ModelArtifact::Logistic(_)));
        assert_eq!(artifact.n_features(), 2);
        assert_eq!(artifact.predict(&[3.0, 1.0]).unwrap(), 1);
        assert_eq!(artifact.predict(&[1.0, 3.0]).unwrap(), 0);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = ModelArtifact::from_json(r#"{"kind": "svm"}"#).unwrap_err();
        assert!(matches!(err, ModelError::InvalidArtifact(_)));
    }

    #[test]
    fn load_reports_path_on_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json").unwrap();
        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
        assert!(err.to_string().contains("model.json"));
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn argmax_prefers_first_on_tie() {
        assert_eq!(argmax_class(&[0, 1], &[0.5, 0.5]).unwrap(), 0);
        assert_eq!(argmax_class(&[3, 7, 9], &[0.1, 0.2, 0.7]).unwrap(), 9);
    }
}
