use crate::error::ModelError;
use serde::Deserialize;
use std::path::Path;

/// Per-feature input transform fitted alongside a classifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `(x - min) * scale`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scaler: Scaler = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn n_features(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { min, .. } => min.len(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let (offsets, scale) = match self {
            Scaler::Standard { mean, scale } => (mean, scale),
            Scaler::MinMax { min, scale } => (min, scale),
        };
        if offsets.len() != scale.len() {
            return Err(ModelError::invalid(format!(
                "scaler has {} offsets but {} scale factors",
                offsets.len(),
                scale.len()
            )));
        }
        Ok(())
    }

    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.n_features() {
            return Err(ModelError::feature_count(self.n_features(), features.len()));
        }
        let out = match self {
            Scaler::Standard { mean, scale } => features
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| {
                    // Constant training columns are stored with a zero scale.
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    (x - m) / s
                })
                .collect(),
            Scaler::MinMax { min, scale } => features
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (lo, s))| (x - lo) * s)
                .collect(),
        };
        Ok(out)
    }
}
