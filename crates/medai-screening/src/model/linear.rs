use super::{Classifier, argmax_class, check_width, default_classes, sigmoid, softmax};
use crate::error::ModelError;
use serde::Deserialize;

/// Logistic regression. One coefficient row means binary (sigmoid),
/// several rows mean one-vs-rest multinomial (softmax).
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        let Some(first) = self.coefficients.first() else {
            return Err(ModelError::invalid("logistic model has no coefficients"));
        };
        if self.coefficients.iter().any(|row| row.len() != first.len()) {
            return Err(ModelError::invalid("coefficient rows differ in width"));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err(ModelError::invalid("one intercept per coefficient row required"));
        }
        let expected_classes = if self.coefficients.len() == 1 {
            2
        } else {
            self.coefficients.len()
        };
        if self.classes.len() != expected_classes {
            return Err(ModelError::invalid(format!(
                "expected {expected_classes} classes, got {}",
                self.classes.len()
            )));
        }
        Ok(())
    }

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features(), features)?;
        let margins: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        if margins.len() == 1 {
            let p = sigmoid(margins[0]);
            Ok(vec![1.0 - p, p])
        } else {
            Ok(softmax(&margins))
        }
    }
}

impl Classifier for LogisticModel {
    fn n_features(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        let proba = self.probabilities(features)?;
        argmax_class(&self.classes, &proba)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, ModelError> {
        self.probabilities(features).map(Some)
    }
}

/// Single-feature cut point. Has no probability output.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdModel {
    pub n_features: usize,
    pub feature: usize,
    pub threshold: f64,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
}

impl ThresholdModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.feature >= self.n_features {
            return Err(ModelError::invalid(format!(
                "feature index {} out of range for {} inputs",
                self.feature, self.n_features
            )));
        }
        if self.classes.len() != 2 {
            return Err(ModelError::invalid("threshold model needs exactly two classes"));
        }
        Ok(())
    }
}

impl Classifier for ThresholdModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        check_width(self.n_features, features)?;
        let idx = usize::from(features[self.feature] >= self.threshold);
        Ok(self.classes[idx])
    }
}
