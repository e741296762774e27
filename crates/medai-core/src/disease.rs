use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const OBESITY_FEATURES: &[&str] = &["age", "gender", "height_cm", "weight_kg", "bmi"];

const LIVER_FEATURES: &[&str] = &[
    "age_of_the_patient",
    "gender_of_the_patient",
    "total_bilirubin",
    "direct_bilirubin",
    "alkphos_alkaline_phosphotase",
    "sgpt_alamine_aminotransferase",
    "sgot_aspartate_aminotransferase",
    "total_protiens",
    "alb_albumin",
    "a/g_ratio_albumin_and_globulin_ratio",
];

const CARDIOVASCULAR_FEATURES: &[&str] = &[
    "age",
    "gender",
    "height_cm",
    "weight_kg",
    "ap_hi",
    "ap_lo",
    "cholesterol",
    "gluc",
    "smoke",
    "alco",
    "active",
    "bmi",
    "pulse_pressure",
    "map",
];

const DIABETES_FEATURES: &[&str] = &[
    "pregnancies",
    "glucose",
    "ap_lo",
    "skin_thickness",
    "insulin",
    "bmi",
    "dpf",
    "age",
];

/// A condition screened by one of the trained classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Obesity,
    Liver,
    Cardiovascular,
    Diabetes,
}

impl Disease {
    /// Screening order.
    pub const ALL: [Disease; 4] = [
        Disease::Obesity,
        Disease::Liver,
        Disease::Cardiovascular,
        Disease::Diabetes,
    ];

    /// Engine key, also the model directory name.
    pub fn key(&self) -> &'static str {
        match self {
            Disease::Obesity => "obesity",
            Disease::Liver => "liver",
            Disease::Cardiovascular => "cardiovascular",
            Disease::Diabetes => "diabetes",
        }
    }

    /// Prefix of the persisted prediction columns.
    ///
    /// Cardiovascular results are stored and reported under `hypertension`.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Disease::Cardiovascular => "hypertension",
            other => other.key(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Disease::Obesity => "Obesity",
            Disease::Liver => "Liver Disease",
            Disease::Cardiovascular => "Hypertension",
            Disease::Diabetes => "Diabetes",
        }
    }

    /// Catalog id used when the `diseases` table cannot be read.
    pub fn builtin_id(&self) -> i32 {
        match self {
            Disease::Obesity => 1,
            Disease::Diabetes => 2,
            Disease::Liver => 3,
            Disease::Cardiovascular => 4,
        }
    }

    /// Minimum future risk reported when the classifier predicts the disease.
    pub fn baseline_risk(&self) -> u32 {
        match self {
            Disease::Obesity => 25,
            Disease::Liver => 30,
            Disease::Cardiovascular => 35,
            Disease::Diabetes => 40,
        }
    }

    /// Ordered model input features.
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Disease::Obesity => OBESITY_FEATURES,
            Disease::Liver => LIVER_FEATURES,
            Disease::Cardiovascular => CARDIOVASCULAR_FEATURES,
            Disease::Diabetes => DIABETES_FEATURES,
        }
    }

    /// Whether inputs are standardized before inference.
    pub fn uses_scaler(&self) -> bool {
        !matches!(self, Disease::Diabetes)
    }

    /// Fixed reporting order of the history views.
    pub fn report_order() -> [Disease; 4] {
        [
            Disease::Obesity,
            Disease::Diabetes,
            Disease::Liver,
            Disease::Cardiovascular,
        ]
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Disease {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "obesity" => Ok(Disease::Obesity),
            "liver" => Ok(Disease::Liver),
            "cardiovascular" | "hypertension" => Ok(Disease::Cardiovascular),
            "diabetes" => Ok(Disease::Diabetes),
            other => Err(CoreError::unknown_disease(other)),
        }
    }
}

/// Encoded gender as expected by the trained models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn code(&self) -> i64 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("male") {
            Some(Gender::Male)
        } else if value.eq_ignore_ascii_case("female") {
            Some(Gender::Female)
        } else {
            None
        }
    }
}
