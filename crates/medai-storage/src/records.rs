//! Account and audit records.

use medai_core::{ApprovalStatus, PatientApproval, Role, StaffRole};
use time::OffsetDateTime;

/// A doctor or receptionist account.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffAccount {
    pub id: i64,
    pub role: StaffRole,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    /// Doctors only.
    pub specialization: Option<String>,
    pub password_hash: String,
    pub status: ApprovalStatus,
    pub created_at: OffsetDateTime,
}

/// Fields of a staff registration. New accounts start out pending.
#[derive(Debug, Clone)]
pub struct NewStaff {
    pub role: StaffRole,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub specialization: Option<String>,
    pub password_hash: String,
}

/// Editable staff profile fields.
#[derive(Debug, Clone)]
pub struct StaffProfileUpdate {
    pub full_name: String,
    pub email: Option<String>,
}

/// A patient portal account.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientAccount {
    pub id: i64,
    /// Hospital patient identifier, links the account to its prescriptions.
    pub patient_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub approval: PatientApproval,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPatientAccount {
    pub patient_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminAccount {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

/// Audit action names.
pub mod actions {
    pub const APPROVE: &str = "APPROVE";
    pub const REJECT: &str = "REJECT";
    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const LOGIN_BLOCKED: &str = "LOGIN_BLOCKED";
    pub const BLOCKED_ACCESS: &str = "BLOCKED_ACCESS";
}

/// A stored audit log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_role: Role,
    pub action_type: String,
    pub target_id: Option<i64>,
    pub target_role: Option<Role>,
    pub details: Option<String>,
    pub created_at: OffsetDateTime,
}

/// An audit entry to be recorded.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Option<i64>,
    pub user_role: Role,
    pub action_type: String,
    pub target_id: Option<i64>,
    pub target_role: Option<Role>,
    pub details: Option<String>,
}

impl NewAuditEntry {
    /// An event about the acting user themselves, with no target.
    pub fn own_action(
        user_id: i64,
        user_role: Role,
        action_type: &str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            user_role,
            action_type: action_type.to_string(),
            target_id: None,
            target_role: None,
            details: Some(details.into()),
        }
    }

    /// An admin decision about another account.
    pub fn admin_decision(
        admin_id: i64,
        action_type: &str,
        target_id: i64,
        target_role: Role,
        details: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(admin_id),
            user_role: Role::Admin,
            action_type: action_type.to_string(),
            target_id: Some(target_id),
            target_role: Some(target_role),
            details: Some(details.into()),
        }
    }
}
