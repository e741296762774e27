//! Multi-disease screening over extracted vitals.

use crate::error::ModelError;
use crate::registry::{DiseaseModel, ModelRegistry};
use crate::risk::future_risk;
use crate::vitals::Vitals;
use medai_core::Disease;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Prediction value reported when a model could not run.
pub const INSUFFICIENT_DATA: i64 = -1;

/// Outcome of one disease model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseResult {
    pub prediction: i64,
    pub confidence: f64,
    pub future_risk: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features_used: Option<Map<String, Value>>,
}

impl DiseaseResult {
    pub fn insufficient() -> Self {
        Self {
            prediction: INSUFFICIENT_DATA,
            confidence: 0.0,
            future_risk: 0,
            features_used: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.prediction != INSUFFICIENT_DATA
    }
}

/// Per-disease results keyed by engine key, in screening order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScreeningReport(BTreeMap<Disease, DiseaseResult>);

impl ScreeningReport {
    pub fn get(&self, disease: Disease) -> Option<&DiseaseResult> {
        self.0.get(&disease)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Disease, &DiseaseResult)> {
        self.0.iter().map(|(d, r)| (*d, r))
    }

    /// Results whose model actually ran.
    pub fn valid(&self) -> impl Iterator<Item = (Disease, &DiseaseResult)> {
        self.iter().filter(|(_, r)| r.is_valid())
    }
}

/// Present feature values for a disease, keyed by feature name.
pub fn extract_disease_features(vitals: &Vitals, disease: Disease) -> Map<String, Value> {
    disease
        .features()
        .iter()
        .filter(|name| vitals.feature(name).is_some())
        .map(|name| ((*name).to_string(), vitals.feature_json(name)))
        .collect()
}

fn has_required_features(vitals: &Vitals, disease: Disease) -> bool {
    disease
        .features()
        .iter()
        .all(|name| vitals.feature(name).is_some())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Runs every registered disease model against a vitals record.
#[derive(Debug, Clone)]
pub struct ScreeningEngine {
    registry: Arc<ModelRegistry>,
}

impl ScreeningEngine {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn screen(&self, vitals: &Vitals) -> ScreeningReport {
        let mut results = BTreeMap::new();
        for disease in Disease::ALL {
            let result = match self.registry.get(disease) {
                Some(model) if has_required_features(vitals, disease) => {
                    match run_model(model, vitals) {
                        Ok(result) => result,
                        Err(error) => {
                            tracing::warn!(disease = %disease, error = %error, "model evaluation failed");
                            DiseaseResult::insufficient()
                        }
                    }
                }
                Some(_) => DiseaseResult::insufficient(),
                None => {
                    tracing::warn!(disease = %disease, "no model registered");
                    DiseaseResult::insufficient()
                }
            };
            results.insert(disease, result);
        }
        ScreeningReport(results)
    }
}

fn run_model(model: &DiseaseModel, vitals: &Vitals) -> Result<DiseaseResult, ModelError> {
    let disease = model.disease;
    let raw: Vec<f64> = model
        .features()
        .iter()
        .map(|name| vitals.feature(name).unwrap_or_default())
        .collect();
    let inputs = match &model.scaler {
        Some(scaler) => scaler.transform(&raw)?,
        None => raw,
    };

    let prediction = model.classifier.predict(&inputs)?;
    let confidence = match model.classifier.predict_proba(&inputs)? {
        Some(proba) => proba.iter().copied().fold(0.0, f64::max) * 100.0,
        None => 100.0,
    };

    Ok(DiseaseResult {
        prediction,
        confidence: round2(confidence),
        future_risk: future_risk(vitals, disease, prediction),
        features_used: Some(extract_disease_features(vitals, disease)),
    })
}
