//! Shared authentication state and bearer token parsing.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AuthError;
use crate::token::TokenIssuer;

/// State required by the role extractors.
///
/// Include it in the application state and expose it through `FromRef`:
///
/// ```ignore
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthState {
    pub issuer: Arc<TokenIssuer>,
}

impl AuthState {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self { issuer }
    }
}

/// Reads the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
/// Returns 401 "Not authenticated" when the header is missing, not a bearer
/// credential, or empty.
pub fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| {
            h.strip_prefix("Bearer ")
                .or_else(|| h.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::unauthorized("Not authenticated"))
}
