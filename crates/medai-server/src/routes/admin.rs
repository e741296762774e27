//! Administration: account approval, system statistics and the audit log.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use medai_api::ApiError;
use medai_auth::{AdminAuth, verify_password};
use medai_core::{ApprovalStatus, PatientApproval, Role, StaffRole, format_rfc3339};
use medai_storage::{AuditEntry, NewAuditEntry, StaffAccount, actions};
use serde::{Deserialize, Serialize};

use super::{StatusResponse, TokenResponse, audit, signed, status};
use crate::server::AppState;

const AUDIT_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/system_stats", get(system_stats))
        .route("/pending", get(pending))
        .route("/approve_receptionist", post(approve_receptionist))
        .route("/reject_receptionist", post(reject_receptionist))
        .route("/approve_doctor", post(approve_doctor))
        .route("/reject_doctor", post(reject_doctor))
        .route("/approve_patient", post(approve_patient))
        .route("/reject_patient", post(reject_patient))
        .route("/audit", get(audit_log))
}

#[derive(Debug, Deserialize)]
pub struct AdminLogin {
    pub username: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<AdminLogin>,
) -> Result<Json<TokenResponse>, ApiError> {
    let admin = state
        .storage
        .find_admin(&req.username)
        .await?
        .filter(|admin| verify_password(&req.password, &admin.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    tracing::info!(admin_id = admin.id, "admin logged in");
    let token = signed(state.auth.issuer.issue_admin(admin.id))?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub active_receptionists: u64,
    pub active_doctors: u64,
    pub active_patients: u64,
}

async fn system_stats(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<SystemStats>, ApiError> {
    let storage = &state.storage;
    Ok(Json(SystemStats {
        active_receptionists: storage
            .count_staff_by_status(StaffRole::Receptionist, ApprovalStatus::Approved)
            .await?,
        active_doctors: storage
            .count_staff_by_status(StaffRole::Doctor, ApprovalStatus::Approved)
            .await?,
        active_patients: storage.count_approved_patients().await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct PendingStaff {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl From<StaffAccount> for PendingStaff {
    fn from(account: StaffAccount) -> Self {
        Self {
            id: account.id,
            username: account.username,
            full_name: account.full_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingPatient {
    pub id: i64,
    pub patient_id: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct PendingAccounts {
    pub receptionists: Vec<PendingStaff>,
    pub doctors: Vec<PendingStaff>,
    pub patients: Vec<PendingPatient>,
}

async fn pending(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<PendingAccounts>, ApiError> {
    let receptionists = state
        .storage
        .list_staff_by_status(StaffRole::Receptionist, ApprovalStatus::Pending)
        .await?;
    let doctors = state
        .storage
        .list_staff_by_status(StaffRole::Doctor, ApprovalStatus::Pending)
        .await?;
    let patients = state.storage.list_pending_patients().await?;

    Ok(Json(PendingAccounts {
        receptionists: receptionists.into_iter().map(PendingStaff::from).collect(),
        doctors: doctors.into_iter().map(PendingStaff::from).collect(),
        patients: patients
            .into_iter()
            .map(|p| PendingPatient {
                id: p.id,
                patient_id: p.patient_id,
                full_name: p.name,
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub user_id: i64,
}

/// Approve or reject, with the matching audit action and response status.
#[derive(Debug, Clone, Copy)]
enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn action(self) -> &'static str {
        match self {
            Decision::Approve => actions::APPROVE,
            Decision::Reject => actions::REJECT,
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }

    fn staff_status(self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }

    fn patient_approval(self) -> PatientApproval {
        match self {
            Decision::Approve => PatientApproval::Approved,
            Decision::Reject => PatientApproval::Rejected,
        }
    }
}

async fn decide_staff(
    state: &AppState,
    admin: &AdminAuth,
    role: StaffRole,
    user_id: i64,
    decision: Decision,
) -> Result<StaffAccount, ApiError> {
    let account = state
        .storage
        .set_staff_status(role, user_id, decision.staff_status())
        .await?;

    audit(
        &state.storage,
        NewAuditEntry::admin_decision(
            admin.id,
            decision.action(),
            account.id,
            Role::from(role),
            format!("{} #{} {}", role.title(), account.id, decision.past_tense()),
        ),
    )
    .await;
    tracing::info!(
        admin_id = admin.id,
        role = %Role::from(role),
        target_id = account.id,
        decision = decision.past_tense(),
        "staff account decided"
    );
    Ok(account)
}

async fn approve_receptionist(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    decide_staff(&state, &admin, StaffRole::Receptionist, req.user_id, Decision::Approve).await?;
    Ok(status(Decision::Approve.past_tense()))
}

async fn reject_receptionist(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    decide_staff(&state, &admin, StaffRole::Receptionist, req.user_id, Decision::Reject).await?;
    Ok(status(Decision::Reject.past_tense()))
}

async fn approve_doctor(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let doctor =
        decide_staff(&state, &admin, StaffRole::Doctor, req.user_id, Decision::Approve).await?;
    if let Some(email) = doctor.email.as_deref() {
        state.notifier.doctor_approved(email, &doctor.username).await;
    }
    Ok(status(Decision::Approve.past_tense()))
}

async fn reject_doctor(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    decide_staff(&state, &admin, StaffRole::Doctor, req.user_id, Decision::Reject).await?;
    Ok(status(Decision::Reject.past_tense()))
}

async fn decide_patient(
    state: &AppState,
    admin: &AdminAuth,
    user_id: i64,
    decision: Decision,
) -> Result<Json<StatusResponse>, ApiError> {
    let patient = state
        .storage
        .set_patient_approval(user_id, decision.patient_approval())
        .await?;

    audit(
        &state.storage,
        NewAuditEntry::admin_decision(
            admin.id,
            decision.action(),
            patient.id,
            Role::Patient,
            format!("Patient #{} {}", patient.id, decision.past_tense()),
        ),
    )
    .await;

    if let Decision::Approve = decision {
        if let Some(email) = patient.email.as_deref() {
            state.notifier.patient_approved(email, &patient.name).await;
        }
    }
    tracing::info!(
        admin_id = admin.id,
        target_id = patient.id,
        decision = decision.past_tense(),
        "patient account decided"
    );
    Ok(status(decision.past_tense()))
}

async fn approve_patient(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    decide_patient(&state, &admin, req.user_id, Decision::Approve).await
}

async fn reject_patient(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    decide_patient(&state, &admin, req.user_id, Decision::Reject).await
}

#[derive(Debug, Serialize)]
pub struct AuditView {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_role: Role,
    pub action_type: String,
    pub target_id: Option<i64>,
    pub target_role: Option<Role>,
    pub details: Option<String>,
    pub created_at: String,
}

impl From<AuditEntry> for AuditView {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            user_role: entry.user_role,
            action_type: entry.action_type,
            target_id: entry.target_id,
            target_role: entry.target_role,
            details: entry.details,
            created_at: format_rfc3339(entry.created_at),
        }
    }
}

async fn audit_log(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<Vec<AuditView>>, ApiError> {
    let entries = state.storage.recent_targeted_audit(AUDIT_LIMIT).await?;
    Ok(Json(entries.into_iter().map(AuditView::from).collect()))
}
