//! Assembly of stored visit rows into history documents.

use medai_core::{Disease, format_rfc3339};
use serde::Serialize;
use serde_json::Value;

use crate::clinical::{ClinicalNotes, PatientDetails, VisitRow, VitalsSnapshot};

/// Risk at or above which a visit is flagged.
pub const HIGH_RISK_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSection {
    pub patient_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<i64>,
}

impl From<&PatientDetails> for PatientSection {
    fn from(p: &PatientDetails) -> Self {
        Self {
            patient_id: p.patient_id.clone(),
            name: p.name.clone(),
            phone: p.phone.clone(),
            age: p.age,
            gender: p.gender,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BloodPressure {
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalsSection {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub bp: BloodPressure,
}

impl From<&VitalsSnapshot> for VitalsSection {
    fn from(v: &VitalsSnapshot) -> Self {
        Self {
            height_cm: v.height_cm,
            weight_kg: v.weight_kg,
            bmi: v.bmi,
            bp: BloodPressure {
                systolic: v.bp_systolic,
                diastolic: v.bp_diastolic,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalSection {
    pub symptoms: Option<String>,
    pub medicines: Option<String>,
    pub tests: Option<String>,
}

impl From<&ClinicalNotes> for ClinicalSection {
    fn from(c: &ClinicalNotes) -> Self {
        Self {
            symptoms: c.symptoms.clone(),
            medicines: c.medicines.clone(),
            tests: c.tests.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEntry {
    /// Storage key, so cardiovascular results read as `hypertension`.
    pub disease: &'static str,
    pub label: &'static str,
    pub result: i64,
    pub confidence: Option<f64>,
    pub risk: Option<f64>,
    pub features_json: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisitSummary {
    pub diseases_detected: usize,
    pub has_high_risk: bool,
    pub max_risk: f64,
}

/// A visit as returned by the history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitDocument {
    pub prescription_serial: String,
    pub created_at: String,
    pub patient: PatientSection,
    pub vitals: VitalsSection,
    pub clinical: ClinicalSection,
    pub predictions: Vec<PredictionEntry>,
    pub summary: VisitSummary,
}

fn parse_features(raw: Option<&str>) -> Option<Value> {
    let raw = raw.filter(|s| !s.is_empty())?;
    serde_json::from_str(raw).ok()
}

impl VisitDocument {
    pub fn from_row(row: &VisitRow) -> Self {
        let mut predictions: Vec<PredictionEntry> = Disease::report_order()
            .into_iter()
            .filter_map(|disease| {
                let outcome = row.outcome(disease)?;
                let result = outcome.result.filter(|r| *r != -1)?;
                Some(PredictionEntry {
                    disease: disease.storage_key(),
                    label: disease.label(),
                    result,
                    confidence: outcome.confidence,
                    risk: outcome.risk,
                    features_json: parse_features(outcome.features_json.as_deref()),
                })
            })
            .collect();

        // Stable: equal risks keep report order, null risks go last.
        predictions.sort_by(|a, b| {
            let key = |p: &PredictionEntry| p.risk.unwrap_or(-1.0);
            key(b).total_cmp(&key(a))
        });

        let summary = VisitSummary {
            diseases_detected: predictions.len(),
            has_high_risk: predictions
                .iter()
                .any(|p| p.risk.is_some_and(|r| r >= HIGH_RISK_THRESHOLD)),
            max_risk: row.max_risk(),
        };

        Self {
            prescription_serial: row.serial.clone(),
            created_at: format_rfc3339(row.created_at),
            patient: PatientSection::from(&row.patient),
            vitals: VitalsSection::from(&row.vitals),
            clinical: ClinicalSection::from(&row.clinical),
            predictions,
            summary,
        }
    }
}
