//! Storage error types.

use std::fmt;

use medai_api::ApiError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. "Doctor".
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// The write collides with an existing record.
    #[error("Conflict: {message}")]
    Conflict {
        /// Message returned to the client.
        message: String,
    },

    /// The data passed in cannot be stored.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of why the input is invalid.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => ApiError::not_found(format!("{entity} not found")),
            StorageError::Conflict { message } => ApiError::conflict(message),
            StorageError::InvalidInput { message } => ApiError::bad_request(message),
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::internal("Internal server error")
            }
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::not_found("Doctor", 7);
        assert_eq!(err.to_string(), "Doctor not found: 7");
        assert!(err.is_not_found());
    }

    #[test]
    fn api_mapping_keeps_client_messages() {
        let api: ApiError = StorageError::not_found("Receptionist", 3).into();
        assert_eq!(api.detail(), "Receptionist not found");

        let api: ApiError =
            StorageError::conflict("This prescription has already been uploaded").into();
        assert_eq!(api.status_code().as_u16(), 409);
        assert_eq!(api.detail(), "This prescription has already been uploaded");

        let api: ApiError = StorageError::invalid_input("bad").into();
        assert_eq!(api.status_code().as_u16(), 400);
    }

    #[test]
    fn backend_failures_hide_details() {
        let api: ApiError = StorageError::connection("password authentication failed").into();
        assert_eq!(api.status_code().as_u16(), 500);
        assert_eq!(api.detail(), "Internal server error");
    }
}
