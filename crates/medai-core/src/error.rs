use thiserror::Error;

/// Core error types for MedAI domain values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown approval status: {0}")]
    UnknownStatus(String),

    #[error("Unknown disease: {0}")]
    UnknownDisease(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    pub fn unknown_role(role: impl Into<String>) -> Self {
        Self::UnknownRole(role.into())
    }

    pub fn unknown_status(status: impl Into<String>) -> Self {
        Self::UnknownStatus(status.into())
    }

    pub fn unknown_disease(disease: impl Into<String>) -> Self {
        Self::UnknownDisease(disease.into())
    }

    pub fn invalid_date(date: impl Into<String>) -> Self {
        Self::InvalidDate(date.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
