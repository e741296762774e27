//! Prescription screening pipeline.
//!
//! Turns OCR text into structured vitals, patient identity and clinical
//! sections, then runs the per-disease classifiers and scores future risk.
//!
//! ```ignore
//! use medai_screening::{ModelRegistry, ScreeningEngine, extract_vitals, text::clean_text};
//!
//! let registry = ModelRegistry::load_dir("models")?;
//! let engine = ScreeningEngine::new(registry);
//! let vitals = extract_vitals(&clean_text(raw_ocr));
//! let report = engine.screen(&vitals);
//! ```

pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod ner;
pub mod ocr;
pub mod registry;
pub mod risk;
pub mod text;
pub mod vitals;

pub use engine::{DiseaseResult, ScreeningEngine, ScreeningReport, extract_disease_features};
pub use error::{ModelError, NerError, OcrError, ScreeningError, ScreeningResult};
pub use identity::{PatientIdentity, extract_patient_identity, extract_prescription_serial};
pub use model::{Classifier, ModelArtifact, Scaler};
pub use ner::{ClinicalSections, EntityRecognizer, HttpEntityRecognizer, NerEntity};
pub use ocr::{GoogleVisionOcr, OcrEngine};
pub use registry::{DiseaseModel, ModelRegistry};
pub use risk::future_risk;
pub use vitals::{Vitals, extract_vitals};
