use crate::error::ModelError;
use crate::model::{Classifier, ModelArtifact, Scaler};
use medai_core::Disease;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Classifier and optional scaler for one disease.
#[derive(Clone)]
pub struct DiseaseModel {
    pub disease: Disease,
    pub classifier: Arc<dyn Classifier>,
    pub scaler: Option<Scaler>,
}

impl DiseaseModel {
    pub fn features(&self) -> &'static [&'static str] {
        self.disease.features()
    }
}

impl std::fmt::Debug for DiseaseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiseaseModel")
            .field("disease", &self.disease)
            .field("n_features", &self.classifier.n_features())
            .field("scaled", &self.scaler.is_some())
            .finish()
    }
}

/// Loaded per-disease models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<Disease, DiseaseModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model after checking its width against the disease's
    /// feature list and that a scaler is present exactly when expected.
    pub fn insert(
        &mut self,
        disease: Disease,
        classifier: Arc<dyn Classifier>,
        scaler: Option<Scaler>,
    ) -> Result<(), ModelError> {
        let expected = disease.features().len();
        if classifier.n_features() != expected {
            return Err(ModelError::invalid(format!(
                "{disease} model takes {} inputs, expected {expected}",
                classifier.n_features()
            )));
        }
        match (&scaler, disease.uses_scaler()) {
            (Some(s), true) if s.n_features() != expected => {
                return Err(ModelError::invalid(format!(
                    "{disease} scaler covers {} inputs, expected {expected}",
                    s.n_features()
                )));
            }
            (None, true) => {
                return Err(ModelError::invalid(format!("{disease} model requires a scaler")));
            }
            (Some(_), false) => {
                return Err(ModelError::invalid(format!("{disease} model takes raw inputs")));
            }
            _ => {}
        }

        self.models.insert(
            disease,
            DiseaseModel {
                disease,
                classifier,
                scaler,
            },
        );
        Ok(())
    }

    /// Loads `<dir>/<disease>/model.json` (and `scaler.json` where the
    /// disease is scaled) for every disease.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        for disease in Disease::ALL {
            let base = dir.join(disease.key());
            let artifact = ModelArtifact::load(&base.join("model.json"))?;
            let scaler = if disease.uses_scaler() {
                Some(Scaler::load(&base.join("scaler.json"))?)
            } else {
                None
            };
            registry.insert(disease, Arc::new(artifact), scaler)?;
            tracing::info!(disease = %disease, path = %base.display(), "loaded screening model");
        }
        Ok(registry)
    }

    pub fn get(&self, disease: Disease) -> Option<&DiseaseModel> {
        self.models.get(&disease)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
