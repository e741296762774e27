//! Storage traits implemented by every backend.

use std::sync::Arc;

use async_trait::async_trait;
use medai_core::{ApprovalStatus, Disease, PatientApproval, StaffRole};
use time::OffsetDateTime;

use crate::clinical::{CursorEntry, HistorySummary, VisitIngest, VisitQuery, VisitRow};
use crate::error::StorageResult;
use crate::records::{
    AdminAccount, AuditEntry, NewAdmin, NewAuditEntry, NewPatientAccount, NewStaff,
    PatientAccount, StaffAccount, StaffProfileUpdate,
};

/// Doctor and receptionist accounts.
#[async_trait]
pub trait StaffStore: Send + Sync {
    async fn find_staff_by_username(
        &self,
        role: StaffRole,
        username: &str,
    ) -> StorageResult<Option<StaffAccount>>;

    async fn find_staff_by_id(&self, role: StaffRole, id: i64)
    -> StorageResult<Option<StaffAccount>>;

    /// Whether the username, or the email when given, is already registered.
    async fn staff_username_or_email_taken(
        &self,
        role: StaffRole,
        username: &str,
        email: Option<&str>,
    ) -> StorageResult<bool>;

    async fn staff_username_taken(&self, role: StaffRole, username: &str) -> StorageResult<bool>;

    /// Stores a new account with `PENDING` status.
    async fn create_staff(&self, staff: NewStaff) -> StorageResult<StaffAccount>;

    async fn update_staff_profile(
        &self,
        role: StaffRole,
        username: &str,
        update: StaffProfileUpdate,
    ) -> StorageResult<()>;

    /// # Errors
    /// `StorageError::NotFound` for an unknown id.
    async fn set_staff_status(
        &self,
        role: StaffRole,
        id: i64,
        status: ApprovalStatus,
    ) -> StorageResult<StaffAccount>;

    async fn count_staff_by_status(&self, role: StaffRole, status: ApprovalStatus)
    -> StorageResult<u64>;

    async fn list_staff_by_status(
        &self,
        role: StaffRole,
        status: ApprovalStatus,
    ) -> StorageResult<Vec<StaffAccount>>;
}

/// Patient portal accounts.
#[async_trait]
pub trait PatientAccountStore: Send + Sync {
    /// Matches the identifier against patient id, email or phone.
    async fn find_patient_by_login(&self, identifier: &str)
    -> StorageResult<Option<PatientAccount>>;

    /// Matches the identifier against email or phone.
    async fn find_patient_by_contact(
        &self,
        identifier: &str,
    ) -> StorageResult<Option<PatientAccount>>;

    async fn find_patient_by_id(&self, id: i64) -> StorageResult<Option<PatientAccount>>;

    async fn patient_email_taken(&self, email: &str) -> StorageResult<bool>;

    async fn patient_phone_taken(&self, phone: &str) -> StorageResult<bool>;

    async fn patient_id_taken(&self, patient_id: &str) -> StorageResult<bool>;

    /// Stores a new account awaiting approval.
    async fn create_patient(&self, account: NewPatientAccount) -> StorageResult<PatientAccount>;

    /// # Errors
    /// `StorageError::Conflict` when another account already uses `email`.
    async fn update_patient_profile(&self, id: i64, name: &str, email: &str)
    -> StorageResult<()>;

    /// # Errors
    /// `StorageError::NotFound` for an unknown id.
    async fn set_patient_approval(
        &self,
        id: i64,
        approval: PatientApproval,
    ) -> StorageResult<PatientAccount>;

    async fn set_patient_password(&self, id: i64, password_hash: &str) -> StorageResult<()>;

    async fn count_approved_patients(&self) -> StorageResult<u64>;

    async fn list_pending_patients(&self) -> StorageResult<Vec<PatientAccount>>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_admin(&self, username_or_email: &str) -> StorageResult<Option<AdminAccount>>;

    async fn create_admin(&self, admin: NewAdmin) -> StorageResult<AdminAccount>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_audit(&self, entry: NewAuditEntry) -> StorageResult<()>;

    /// Entries that name a target role, newest first.
    async fn recent_targeted_audit(&self, limit: u32) -> StorageResult<Vec<AuditEntry>>;
}

/// Prescriptions, health records and predictions.
#[async_trait]
pub trait ClinicalStore: Send + Sync {
    /// Disease catalog ids keyed by model.
    async fn disease_catalog(&self) -> StorageResult<Vec<(Disease, i32)>>;

    /// Writes a visit atomically: upserts patient details, then inserts the
    /// prescription, its health record and its prediction row.
    ///
    /// # Errors
    /// `StorageError::Conflict` if the serial was already ingested; nothing
    /// is written in that case.
    async fn ingest_visit(&self, visit: VisitIngest) -> StorageResult<()>;

    async fn count_visits(&self, query: &VisitQuery) -> StorageResult<u64>;

    /// One page of visits, ordered by the query's sort.
    async fn list_visits(&self, query: &VisitQuery) -> StorageResult<Vec<VisitRow>>;

    async fn visit_detail(&self, account_id: i64, serial: &str) -> StorageResult<Option<VisitRow>>;

    /// Visits strictly older than `cursor`, newest first.
    async fn visit_cursor(
        &self,
        account_id: i64,
        cursor: Option<OffsetDateTime>,
        limit: u32,
    ) -> StorageResult<Vec<CursorEntry>>;

    async fn history_summary(&self, account_id: i64) -> StorageResult<HistorySummary>;
}

/// Everything the server needs from a backend.
pub trait MedaiStorage:
    StaffStore + PatientAccountStore + AdminStore + AuditStore + ClinicalStore
{
}

impl<T> MedaiStorage for T where
    T: StaffStore + PatientAccountStore + AdminStore + AuditStore + ClinicalStore
{
}

pub type DynStorage = Arc<dyn MedaiStorage>;
