use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or evaluating a classifier.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ModelError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArtifact(message.into())
    }

    #[must_use]
    pub fn feature_count(expected: usize, actual: usize) -> Self {
        Self::FeatureCount { expected, actual }
    }
}

/// Errors from the OCR service.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR service error: {0}")]
    Service(String),

    #[error("unexpected OCR response: {0}")]
    InvalidResponse(String),
}

/// Errors from the token-classification service.
#[derive(Debug, Error)]
pub enum NerError {
    #[error("NER request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NER service error: {0}")]
    Service(String),

    #[error("unexpected NER response: {0}")]
    InvalidResponse(String),
}

/// Any failure raised by the screening pipeline.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Ner(#[from] NerError),
}

pub type ScreeningResult<T> = std::result::Result<T, ScreeningError>;
