//! Authentication and authorization error types.

use crate::token::JwtError;

/// Errors that can occur while authenticating a request or handling credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request lacks valid credentials, or the token failed validation.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Message returned to the client.
        message: String,
    },

    /// The token is valid but belongs to a different role.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Message returned to the client.
        message: String,
    },

    /// Token encoding or key setup failed.
    #[error(transparent)]
    Jwt(#[from] JwtError),

    /// Password hashing failed.
    #[error("Password hashing failed: {message}")]
    PasswordHash {
        /// Underlying hasher message.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `PasswordHash` error.
    #[must_use]
    pub fn password_hash(message: impl Into<String>) -> Self {
        Self::PasswordHash {
            message: message.into(),
        }
    }

    /// Returns `true` if the client should retry with other credentials.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Forbidden { .. })
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
