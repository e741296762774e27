//! Receptionist portal: account lifecycle and prescription uploads.

use axum::{
    Form, Json, Router,
    extract::{Multipart, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use medai_api::ApiError;
use medai_auth::{ReceptionistAuth, verify_password};
use medai_core::{ApprovalStatus, StaffRole};
use medai_storage::{NewStaff, StaffProfileUpdate};
use serde::{Deserialize, Serialize};

use super::{LoginForm, MessageResponse, TokenResponse, hashed, message, signed, upload_file};
use crate::ingest::IngestOutcome;
use crate::server::AppState;

const ROLE: StaffRole = StaffRole::Receptionist;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/update_profile", put(update_profile))
        .route("/analyze_and_store", post(analyze_and_store))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let taken = state
        .storage
        .staff_username_or_email_taken(ROLE, &req.username, Some(&req.email))
        .await?;
    if taken {
        return Err(ApiError::bad_request("User already exists"));
    }

    let account = state
        .storage
        .create_staff(NewStaff {
            role: ROLE,
            username: req.username,
            full_name: req.name,
            email: Some(req.email),
            specialization: None,
            password_hash: hashed(&req.password)?,
        })
        .await?;
    tracing::info!(id = account.id, username = %account.username, "receptionist registered");
    Ok(message("Success"))
}

#[derive(Debug, Serialize)]
struct PendingLogin {
    status: ApprovalStatus,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ReceptionistToken {
    #[serde(flatten)]
    token: TokenResponse,
    username: String,
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let account = state
        .storage
        .find_staff_by_username(ROLE, &form.username)
        .await?
        .filter(|account| verify_password(&form.password, &account.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !account.status.is_approved() {
        return Ok(Json(PendingLogin {
            status: account.status,
            message: "Pending Admin Approval",
        })
        .into_response());
    }

    let token = signed(state.auth.issuer.issue_receptionist(&account.username))?;
    Ok(Json(ReceptionistToken {
        token: TokenResponse::bearer(token),
        username: account.username,
    })
    .into_response())
}

#[derive(Debug, Serialize)]
pub struct ReceptionistProfile {
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub status: ApprovalStatus,
}

async fn me(
    State(state): State<AppState>,
    auth: ReceptionistAuth,
) -> Result<Json<ReceptionistProfile>, ApiError> {
    let account = state
        .storage
        .find_staff_by_username(ROLE, &auth.username)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;
    Ok(Json(ReceptionistProfile {
        username: account.username,
        name: account.full_name,
        email: account.email,
        status: account.status,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

async fn update_profile(
    State(state): State<AppState>,
    auth: ReceptionistAuth,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .storage
        .update_staff_profile(
            ROLE,
            &auth.username,
            StaffProfileUpdate {
                full_name: req.name,
                email: Some(req.email),
            },
        )
        .await?;
    Ok(message("Updated"))
}

async fn analyze_and_store(
    State(state): State<AppState>,
    auth: ReceptionistAuth,
    multipart: Multipart,
) -> Result<Json<IngestOutcome>, ApiError> {
    let upload = upload_file(multipart).await?;
    tracing::info!(
        receptionist = %auth.username,
        bytes = upload.bytes.len(),
        "prescription upload received"
    );
    let outcome = state.pipeline.ingest(upload).await?;
    Ok(Json(outcome))
}
