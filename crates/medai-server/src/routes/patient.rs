//! Patient portal.
//!
//! Patients register themselves and wait for an administrator. Every
//! authenticated route goes through [`ApprovedPatient`], which turns away
//! accounts that are not approved and leaves an audit trail of the attempt.

use axum::{
    Form, Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::QueryRejection},
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use medai_api::{ApiError, Paginated};
use medai_auth::{PatientToken, verify_password};
use medai_core::{DateBound, Role, format_rfc3339, parse_date_bound};
use medai_storage::{
    HistorySummary, NewAuditEntry, NewPatientAccount, PatientAccount, SortField, SortOrder,
    VisitDocument, VisitQuery, VisitSelector, actions,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{
    DEFAULT_PAGE_LIMIT, LoginForm, MAX_PAGE_LIMIT, MessageResponse, StatusResponse, TokenResponse,
    audit, hashed, message, page_window, present, query_params, signed, status,
};
use crate::server::AppState;

const EXPORT_LIMIT: u32 = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/update", put(update))
        .route("/history", get(history))
        .route("/history/summary", get(history_summary))
        .route("/history/cursor", get(history_cursor))
        .route("/history/export/raw", get(export_raw))
        .route("/history/{serial}", get(visit_detail))
        .route("/forgot_password", post(forgot_password))
        .route("/reset_password", post(reset_password))
        .route("/ping", get(ping))
}

/// A patient whose token is valid and whose account has been approved.
#[derive(Debug, Clone)]
pub struct ApprovedPatient(pub PatientAccount);

impl FromRequestParts<AppState> for ApprovedPatient {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = PatientToken::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let account = state
            .storage
            .find_patient_by_id(token.id)
            .await
            .map_err(|e| ApiError::from(e).into_response())?
            .ok_or_else(|| ApiError::unauthorized("User does not exist").into_response())?;

        if !account.approval.is_approved() {
            tracing::info!(account_id = account.id, "blocked unapproved patient");
            audit(
                &state.storage,
                NewAuditEntry::own_action(
                    account.id,
                    Role::Patient,
                    actions::BLOCKED_ACCESS,
                    "Unapproved patient tried to access history",
                ),
            )
            .await;
            return Err(ApiError::forbidden(
                "Access Denied: Your account is awaiting Admin approval.",
            )
            .into_response());
        }

        Ok(Self(account))
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub patient_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct Registered {
    status: &'static str,
    message: &'static str,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Registered>, ApiError> {
    let email = present(req.email);
    let phone = present(req.phone);
    if email.is_none() && phone.is_none() {
        return Err(ApiError::bad_request("Either email or phone is required"));
    }

    if let Some(email) = &email {
        if state.storage.patient_email_taken(email).await? {
            return Err(ApiError::bad_request("Email already used"));
        }
    }
    if let Some(phone) = &phone {
        if state.storage.patient_phone_taken(phone).await? {
            return Err(ApiError::bad_request("Phone already used"));
        }
    }
    if state.storage.patient_id_taken(&req.patient_id).await? {
        return Err(ApiError::bad_request("Patient ID already exists"));
    }

    let account = state
        .storage
        .create_patient(NewPatientAccount {
            patient_id: req.patient_id,
            name: req.name,
            email,
            phone,
            password_hash: hashed(&req.password)?,
        })
        .await?;
    tracing::info!(id = account.id, patient_id = %account.patient_id, "patient registered");

    Ok(Json(Registered {
        status: "registered",
        message: "Waiting for admin approval",
    }))
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = state
        .storage
        .find_patient_by_login(&form.username)
        .await?
        .filter(|account| verify_password(&form.password, &account.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !account.approval.is_approved() {
        audit(
            &state.storage,
            NewAuditEntry::own_action(
                account.id,
                Role::Patient,
                actions::LOGIN_BLOCKED,
                "Login attempt before admin approval",
            ),
        )
        .await;
        return Err(ApiError::forbidden("Account awaiting admin approval"));
    }

    audit(
        &state.storage,
        NewAuditEntry::own_action(
            account.id,
            Role::Patient,
            actions::LOGIN_SUCCESS,
            "Patient logged in",
        ),
    )
    .await;

    let token = signed(state.auth.issuer.issue_patient(account.id))?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[derive(Debug, Serialize)]
pub struct PatientProfile {
    pub patient_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

async fn me(ApprovedPatient(account): ApprovedPatient) -> Json<PatientProfile> {
    Json(PatientProfile {
        patient_id: account.patient_id,
        name: account.name,
        email: account.email,
        phone: account.phone,
    })
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

async fn update(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<StatusResponse>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    if account.email.as_deref() != Some(email)
        && state.storage.patient_email_taken(email).await?
    {
        return Err(ApiError::conflict("Email already used"));
    }
    state
        .storage
        .update_patient_profile(account.id, &req.name, email)
        .await?;
    Ok(status("updated"))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySort {
    #[default]
    CreatedAt,
    Risk,
}

impl From<HistorySort> for SortField {
    fn from(sort: HistorySort) -> Self {
        match sort {
            HistorySort::CreatedAt => SortField::CreatedAt,
            HistorySort::Risk => SortField::Risk,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOrder {
    Asc,
    #[default]
    Desc,
}

impl From<HistoryOrder> for SortOrder {
    fn from(order: HistoryOrder) -> Self {
        match order {
            HistoryOrder::Asc => SortOrder::Asc,
            HistoryOrder::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(default)]
    pub sort_by: HistorySort,
    #[serde(default)]
    pub order: HistoryOrder,
}

fn date_bound(
    value: Option<&str>,
    bound: DateBound,
) -> Result<Option<OffsetDateTime>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_date_bound(value, bound)
            .map(Some)
            .map_err(|e| ApiError::unprocessable_entity(e.to_string())),
        None => Ok(None),
    }
}

async fn history(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Paginated<VisitDocument>>, ApiError> {
    let params = query_params(params)?;
    let (page, limit) = page_window(params.page, params.limit)?;

    let mut query = VisitQuery::new(VisitSelector::ByAccount(account.id), page, limit);
    query.from = date_bound(params.from_date.as_deref(), DateBound::Start)?;
    query.to = date_bound(params.to_date.as_deref(), DateBound::End)?;
    query.sort = params.sort_by.into();
    query.order = params.order.into();

    paginated_history(&state, &query).await.map(Json)
}

async fn paginated_history(
    state: &AppState,
    query: &VisitQuery,
) -> Result<Paginated<VisitDocument>, ApiError> {
    let total = state.storage.count_visits(query).await?;
    let rows = state.storage.list_visits(query).await?;
    let data = rows.iter().map(VisitDocument::from_row).collect();
    Ok(Paginated::new(query.page, query.limit, total, data))
}

async fn history_summary(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
) -> Result<Json<HistorySummary>, ApiError> {
    Ok(Json(state.storage.history_summary(account.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CursorParams {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CursorItem {
    pub prescription_serial: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct CursorPage {
    pub next_cursor: Option<String>,
    pub data: Vec<CursorItem>,
}

/// Newest first, strictly older than `cursor`.
async fn history_cursor(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
    params: Result<Query<CursorParams>, QueryRejection>,
) -> Result<Json<CursorPage>, ApiError> {
    let params = query_params(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::unprocessable_entity(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    let cursor = params
        .cursor
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            OffsetDateTime::parse(c, &Rfc3339)
                .map_err(|e| ApiError::unprocessable_entity(format!("invalid cursor '{c}': {e}")))
        })
        .transpose()?;

    let entries = state
        .storage
        .visit_cursor(account.id, cursor, limit)
        .await?;

    let data: Vec<CursorItem> = entries
        .into_iter()
        .map(|entry| CursorItem {
            prescription_serial: entry.serial,
            created_at: format_rfc3339(entry.created_at),
        })
        .collect();
    let next_cursor = data.last().map(|item| item.created_at.clone());
    Ok(Json(CursorPage { next_cursor, data }))
}

async fn export_raw(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
) -> Result<Json<Paginated<VisitDocument>>, ApiError> {
    let query = VisitQuery::new(VisitSelector::ByAccount(account.id), 1, EXPORT_LIMIT);
    paginated_history(&state, &query).await.map(Json)
}

async fn visit_detail(
    State(state): State<AppState>,
    ApprovedPatient(account): ApprovedPatient,
    Path(serial): Path<String>,
) -> Result<Json<VisitDocument>, ApiError> {
    let row = state
        .storage
        .visit_detail(account.id, &serial)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription not found"))?;
    Ok(Json(VisitDocument::from_row(&row)))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub identifier: String,
}

/// Always answers the same way so the response does not reveal accounts.
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account = state
        .storage
        .find_patient_by_contact(req.identifier.trim())
        .await?;

    if let Some(account) = account {
        match account.email.as_deref() {
            Some(email) => {
                let token = signed(state.auth.issuer.issue_reset(account.id))?;
                state
                    .notifier
                    .password_reset(email, &account.name, &token)
                    .await;
            }
            None => {
                tracing::info!(account_id = account.id, "no email on file, reset link not sent");
            }
        }
    }

    Ok(message("If the account exists, a reset link has been sent!"))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let invalid = || ApiError::bad_request("Invalid or expired token");

    let id = state.auth.issuer.verify_reset(&req.token).map_err(|e| {
        tracing::debug!(error = %e, "reset token rejected");
        invalid()
    })?;
    let account = state
        .storage
        .find_patient_by_id(id)
        .await?
        .ok_or_else(invalid)?;

    state
        .storage
        .set_patient_password(account.id, &hashed(&req.new_password)?)
        .await?;
    tracing::info!(account_id = account.id, "patient password reset");
    Ok(message("Password has been reset successfully!"))
}

#[derive(Debug, Serialize)]
struct Ping {
    status: &'static str,
    service: &'static str,
}

async fn ping() -> Json<Ping> {
    Json(Ping {
        status: "ok",
        service: "patient",
    })
}
