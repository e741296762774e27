//! Doctor portal: registration, login and patient history lookup.

use axum::{
    Form, Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::{get, post},
};
use medai_api::{ApiError, Paginated};
use medai_auth::{DoctorAuth, verify_password};
use medai_core::StaffRole;
use medai_storage::{NewStaff, VisitDocument, VisitQuery, VisitSelector};
use serde::{Deserialize, Serialize};

use super::{
    LoginForm, MessageResponse, TokenResponse, hashed, message, page_window, query_params, signed,
};
use crate::server::AppState;

const ROLE: StaffRole = StaffRole::Doctor;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/patients/history", get(patient_history))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.storage.staff_username_taken(ROLE, &req.username).await? {
        return Err(ApiError::bad_request("Username already exists"));
    }

    let account = state
        .storage
        .create_staff(NewStaff {
            role: ROLE,
            username: req.username,
            full_name: req.full_name,
            email: Some(req.email),
            specialization: Some(req.specialization),
            password_hash: hashed(&req.password)?,
        })
        .await?;
    tracing::info!(id = account.id, username = %account.username, "doctor registered");
    Ok(message("Registration submitted for approval"))
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = state
        .storage
        .find_staff_by_username(ROLE, &form.username)
        .await?
        .filter(|account| verify_password(&form.password, &account.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !account.status.is_approved() {
        return Err(ApiError::forbidden("Account not approved"));
    }

    let token = signed(state.auth.issuer.issue_doctor(&account.username, account.id))?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[derive(Debug, Serialize)]
pub struct DoctorProfile {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub specialization: Option<String>,
}

async fn me(
    State(state): State<AppState>,
    auth: DoctorAuth,
) -> Result<Json<DoctorProfile>, ApiError> {
    let account = match auth.id {
        Some(id) => state.storage.find_staff_by_id(ROLE, id).await?,
        None => state.storage.find_staff_by_username(ROLE, &auth.username).await?,
    }
    .ok_or_else(|| ApiError::not_found("Doctor not found"))?;

    Ok(Json(DoctorProfile {
        id: account.id,
        username: account.username,
        full_name: account.full_name,
        email: account.email,
        specialization: account.specialization,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Visits whose patient id or phone matches `q`, newest first.
async fn patient_history(
    State(state): State<AppState>,
    auth: DoctorAuth,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Paginated<VisitDocument>>, ApiError> {
    let params = query_params(params)?;
    let (page, limit) = page_window(params.page, params.limit)?;

    let query = VisitQuery::new(VisitSelector::ByPatientIdOrPhone(params.q), page, limit);
    let total = state.storage.count_visits(&query).await?;
    let rows = state.storage.list_visits(&query).await?;
    tracing::debug!(doctor = %auth.username, total, "patient history lookup");

    let data = rows.iter().map(VisitDocument::from_row).collect();
    Ok(Json(Paginated::new(page, limit, total, data)))
}
