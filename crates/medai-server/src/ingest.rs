//! Prescription upload pipeline.
//!
//! OCR, text cleanup, extraction, screening and the atomic write of a visit.
//! The public home analyzer runs the same steps up to screening and stores
//! nothing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use medai_api::ApiError;
use medai_core::Disease;
use medai_screening::{
    ClinicalSections, EntityRecognizer, OcrEngine, OcrError, ScreeningEngine, ScreeningReport,
    Vitals, extract_disease_features, extract_patient_identity, extract_prescription_serial,
    extract_vitals, text::clean_text,
};
use medai_storage::{
    ClinicalNotes, DiseaseOutcome, DynStorage, PatientDetails, PredictionRow, StorageError,
    VisitIngest, VitalsSnapshot,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

pub const MODEL_NAME: &str = "auto_ml_engine";
pub const MODEL_VERSION: &str = "v1.0";

const ALLOWED_IMAGE_TYPES: [&str; 2] = ["image/png", "image/jpeg"];
const UNKNOWN_PATIENT: &str = "Unknown";

/// Catalog ids of the screened diseases, as stored in prediction rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseCatalog {
    ids: BTreeMap<Disease, i32>,
}

impl DiseaseCatalog {
    pub fn builtin() -> Self {
        Self::from_pairs(Disease::ALL.map(|d| (d, d.builtin_id())))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Disease, i32)>) -> Self {
        Self {
            ids: pairs.into_iter().collect(),
        }
    }

    /// Reads the catalog from storage, falling back to the built-in ids.
    pub async fn load(storage: &DynStorage) -> Self {
        match storage.disease_catalog().await {
            Ok(pairs) if !pairs.is_empty() => {
                let catalog = Self::from_pairs(pairs);
                tracing::info!(diseases = catalog.ids.len(), "disease catalog loaded");
                catalog
            }
            Ok(_) => {
                tracing::warn!("disease catalog is empty, using built-in ids");
                Self::builtin()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load disease catalog, using built-in ids");
                Self::builtin()
            }
        }
    }

    pub fn id(&self, disease: Disease) -> Option<i32> {
        self.ids.get(&disease).copied()
    }
}

/// An uploaded prescription image.
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Only PNG or JPEG images are allowed")]
    UnsupportedType,

    #[error("Image size exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: usize },

    #[error("Unable to extract readable text from prescription image")]
    NoText,

    #[error("Prescription serial number not found in document")]
    MissingSerial,

    #[error("Patient phone number not found in document")]
    MissingPhone,

    #[error("This prescription has already been uploaded")]
    Duplicate,

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        if err.is_conflict() {
            Self::Duplicate
        } else {
            Self::Storage(err)
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedType
            | IngestError::TooLarge { .. }
            | IngestError::NoText
            | IngestError::MissingSerial
            | IngestError::MissingPhone => ApiError::bad_request(err.to_string()),
            IngestError::Duplicate => ApiError::conflict(err.to_string()),
            IngestError::Ocr(_) | IngestError::Storage(_) => {
                tracing::error!(error = %err, "prescription analysis failed");
                ApiError::internal("Internal server error during prescription analysis")
            }
        }
    }
}

/// Result of the public analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub clean_text: String,
    pub extracted_data: Vitals,
    pub diseases: ScreeningReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientIdentityView {
    pub name: String,
    pub phone: String,
}

/// Response of a stored upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub prescription_serial: String,
    pub patient_id: String,
    pub patient_identity: PatientIdentityView,
    pub clean_text: String,
    pub extracted_data: Vitals,
    pub diseases: ScreeningReport,
    pub ner_extracted: ClinicalSections,
}

pub struct IngestPipeline {
    ocr: Arc<dyn OcrEngine>,
    ner: Arc<dyn EntityRecognizer>,
    engine: ScreeningEngine,
    catalog: DiseaseCatalog,
    storage: DynStorage,
    min_score: f64,
    upload_limit: usize,
}

impl IngestPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        ner: Arc<dyn EntityRecognizer>,
        engine: ScreeningEngine,
        catalog: DiseaseCatalog,
        storage: DynStorage,
    ) -> Self {
        Self {
            ocr,
            ner,
            engine,
            catalog,
            storage,
            min_score: medai_screening::ner::DEFAULT_MIN_SCORE,
            upload_limit: 5 * 1024 * 1024,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    pub fn upload_limit(&self) -> usize {
        self.upload_limit
    }

    /// OCR and screening without persistence.
    pub async fn analyze(&self, image: &[u8]) -> Result<Analysis, OcrError> {
        let clean_text = clean_text(&self.read_text(image).await?);
        let extracted_data = extract_vitals(&clean_text);
        let diseases = self.engine.screen(&extracted_data);
        Ok(Analysis {
            clean_text,
            extracted_data,
            diseases,
        })
    }

    pub fn validate_upload(&self, upload: &Upload) -> Result<(), IngestError> {
        let allowed = upload
            .content_type
            .as_deref()
            .is_some_and(|ct| ALLOWED_IMAGE_TYPES.contains(&ct));
        if !allowed {
            return Err(IngestError::UnsupportedType);
        }
        if upload.bytes.len() > self.upload_limit {
            return Err(IngestError::TooLarge {
                limit_mb: self.upload_limit / (1024 * 1024),
            });
        }
        Ok(())
    }

    /// Runs the full upload and stores the visit.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        self.validate_upload(&upload)?;

        let raw = self.read_text(&upload.bytes).await?;
        // Whitespace alone cleans to nothing, so it counts as unreadable.
        if raw.trim().is_empty() {
            return Err(IngestError::NoText);
        }
        let clean = clean_text(&raw);

        let serial = extract_prescription_serial(&clean).ok_or(IngestError::MissingSerial)?;
        tracing::info!(serial = %serial, "prescription serial extracted");

        let mut vitals = extract_vitals(&clean);
        let sections = self.clinical_sections(&clean).await;

        let identity = extract_patient_identity(&clean);
        let patient_id = identity.patient_id.unwrap_or_else(generated_patient_id);
        let name = identity
            .name
            .unwrap_or_else(|| UNKNOWN_PATIENT.to_string());
        let phone = identity.phone.ok_or(IngestError::MissingPhone)?;

        vitals.patient_id = Some(patient_id.clone());
        vitals.name = Some(name.clone());
        vitals.phone = Some(phone.clone());

        let diseases = self.engine.screen(&vitals);
        let prediction = prediction_row(&diseases, &vitals, &self.catalog);
        tracing::info!(
            serial = %serial,
            valid_predictions = prediction.outcomes.len(),
            "screening complete"
        );

        self.storage
            .ingest_visit(VisitIngest {
                serial: serial.clone(),
                patient: PatientDetails {
                    patient_id: patient_id.clone(),
                    name: Some(name.clone()),
                    phone: Some(phone.clone()),
                    age: vitals.age,
                    gender: vitals.gender,
                },
                clean_text: clean.clone(),
                clinical: ClinicalNotes {
                    symptoms: non_empty(&sections.symptoms),
                    medicines: non_empty(&sections.medicines),
                    tests: non_empty(&sections.tests),
                },
                vitals: VitalsSnapshot {
                    height_cm: vitals.height_cm,
                    weight_kg: vitals.weight_kg,
                    bmi: vitals.bmi,
                    bp_systolic: vitals.ap_hi,
                    bp_diastolic: vitals.ap_lo,
                },
                prediction,
            })
            .await?;

        Ok(IngestOutcome {
            prescription_serial: serial,
            patient_id,
            patient_identity: PatientIdentityView { name, phone },
            clean_text: clean,
            extracted_data: vitals,
            diseases,
            ner_extracted: sections,
        })
    }

    async fn read_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let started = Instant::now();
        let text = self.ocr.extract_text(image).await?;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "ocr complete"
        );
        Ok(text)
    }

    async fn clinical_sections(&self, text: &str) -> ClinicalSections {
        match self.ner.recognize(text).await {
            Ok(entities) => ClinicalSections::from_entities(&entities, self.min_score),
            Err(e) => {
                tracing::warn!(error = %e, "entity recognition failed, continuing without clinical sections");
                ClinicalSections::default()
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// `PID-<UTC yyyymmddHHMMSS + microseconds>` for prescriptions without an id.
pub fn generated_patient_id() -> String {
    patient_id_at(OffsetDateTime::now_utc())
}

fn patient_id_at(at: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day][hour][minute][second][subsecond digits:6]");
    let stamp = at
        .format(format)
        .unwrap_or_else(|_| at.unix_timestamp_nanos().to_string());
    format!("PID-{stamp}")
}

/// Builds the stored prediction row from the models that ran and are in the catalog.
pub fn prediction_row(
    report: &ScreeningReport,
    vitals: &Vitals,
    catalog: &DiseaseCatalog,
) -> PredictionRow {
    let mut outcomes = BTreeMap::new();
    let mut ids = Vec::new();
    let mut names = Vec::new();

    for (disease, result) in report.valid() {
        let Some(id) = catalog.id(disease) else {
            continue;
        };
        let features_json = json!({
            "features": extract_disease_features(vitals, disease),
            "expected_features": disease.features(),
        });
        outcomes.insert(
            disease,
            DiseaseOutcome {
                result: result.prediction,
                confidence: result.confidence,
                risk: f64::from(result.future_risk),
                features_json: features_json.to_string(),
            },
        );
        ids.push(id.to_string());
        names.push(disease.storage_key());
    }

    PredictionRow {
        outcomes,
        disease_ids: (!ids.is_empty()).then(|| ids.join(",")),
        disease_names: (!names.is_empty()).then(|| names.join(",")),
        model_name: MODEL_NAME.to_string(),
        model_version: MODEL_VERSION.to_string(),
    }
}
