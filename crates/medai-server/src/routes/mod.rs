//! API route groups, one module per portal.

use axum::{
    Json, Router,
    extract::{Multipart, Query, rejection::QueryRejection},
};
use medai_api::ApiError;
use medai_auth::{AuthError, JwtError};
use medai_storage::{DynStorage, NewAuditEntry};
use serde::{Deserialize, Serialize};

use crate::ingest::Upload;
use crate::server::AppState;

pub mod admin;
pub mod doctor;
pub mod home;
pub mod patient;
pub mod receptionist;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 50;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/home", home::router())
        .nest("/api/receptionist", receptionist::router())
        .nest("/api/doctor", doctor::router())
        .nest("/api/patient", patient::router())
        .nest("/api/admin", admin::router())
}

/// `application/x-www-form-urlencoded` login body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub(crate) fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

pub(crate) fn status(status: &'static str) -> Json<StatusResponse> {
    Json(StatusResponse { status })
}

pub(crate) fn signed(token: Result<String, JwtError>) -> Result<String, ApiError> {
    token.map_err(|e| ApiError::from(AuthError::from(e)))
}

pub(crate) fn hashed(password: &str) -> Result<String, ApiError> {
    medai_auth::hash_password(password).map_err(ApiError::from)
}

/// Query strings that fail to parse are reported as 422.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::unprocessable_entity(rejection.body_text()))
}

/// Resolves `page` and `limit`, defaulting to the first page of ten.
pub(crate) fn page_window(page: Option<u32>, limit: Option<u32>) -> Result<(u32, u32), ApiError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if page < 1 {
        return Err(ApiError::unprocessable_entity("page must be >= 1"));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::unprocessable_entity(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok((page, limit))
}

/// Records an audit entry. A failed write is logged and never fails the request.
pub(crate) async fn audit(storage: &DynStorage, entry: NewAuditEntry) {
    let action = entry.action_type.clone();
    if let Err(e) = storage.record_audit(entry).await {
        tracing::warn!(action = %action, error = %e, "failed to record audit entry");
    }
}

/// Reads the `file` part of a multipart upload.
pub(crate) async fn upload_file(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(Upload {
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::unprocessable_entity("file is required"))
}

/// Empty or whitespace-only strings count as absent.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
