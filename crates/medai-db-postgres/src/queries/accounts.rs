//! Staff, patient, admin and audit queries.

use async_trait::async_trait;
use medai_core::{ApprovalStatus, PatientApproval, Role, StaffRole};
use medai_storage::{
    AdminAccount, AdminStore, AuditEntry, AuditStore, NewAdmin, NewAuditEntry, NewPatientAccount,
    NewStaff, PatientAccount, PatientAccountStore, StaffAccount, StaffProfileUpdate, StaffStore,
    StorageError, StorageResult,
};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;

use crate::error::{is_unique_violation, query_error};
use crate::storage::PostgresStorage;

const STAFF_COLUMNS: &str =
    "id, username, full_name, email, specialization, password_hash, status, created_at";

const PATIENT_COLUMNS: &str =
    "id, patient_id, name, email, phone, password_hash, is_approved, created_at";

type StaffTuple = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    OffsetDateTime,
);

type PatientTuple = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    i16,
    OffsetDateTime,
);

type AuditTuple = (
    i64,
    Option<i64>,
    String,
    String,
    Option<i64>,
    Option<String>,
    Option<String>,
    OffsetDateTime,
);

fn staff_table(role: StaffRole) -> &'static str {
    match role {
        StaffRole::Doctor => "doctors",
        StaffRole::Receptionist => "receptionists",
    }
}

fn staff_from_row(role: StaffRole, row: StaffTuple) -> StorageResult<StaffAccount> {
    let (id, username, full_name, email, specialization, password_hash, status, created_at) = row;
    let status = status
        .parse::<ApprovalStatus>()
        .map_err(|e| StorageError::internal(e.to_string()))?;
    Ok(StaffAccount {
        id,
        role,
        username,
        full_name,
        email,
        specialization,
        password_hash,
        status,
        created_at,
    })
}

fn patient_from_row(row: PatientTuple) -> StorageResult<PatientAccount> {
    let (id, patient_id, name, email, phone, password_hash, is_approved, created_at) = row;
    let approval =
        PatientApproval::try_from(is_approved).map_err(|e| StorageError::internal(e.to_string()))?;
    Ok(PatientAccount {
        id,
        patient_id,
        name,
        email,
        phone,
        password_hash,
        approval,
        created_at,
    })
}

fn audit_from_row(row: AuditTuple) -> StorageResult<AuditEntry> {
    let (id, user_id, user_role, action_type, target_id, target_role, details, created_at) = row;
    let parse = |raw: &str| {
        raw.parse::<Role>()
            .map_err(|e| StorageError::internal(e.to_string()))
    };
    Ok(AuditEntry {
        id,
        user_id,
        user_role: parse(&user_role)?,
        action_type,
        target_id,
        target_role: target_role.as_deref().map(parse).transpose()?,
        details,
        created_at,
    })
}

#[async_trait]
impl StaffStore for PostgresStorage {
    async fn find_staff_by_username(
        &self,
        role: StaffRole,
        username: &str,
    ) -> StorageResult<Option<StaffAccount>> {
        let sql = format!(
            "SELECT {STAFF_COLUMNS} FROM {} WHERE username = $1",
            staff_table(role)
        );
        let row: Option<StaffTuple> = query_as(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to load staff account", e))?;
        row.map(|r| staff_from_row(role, r)).transpose()
    }

    async fn find_staff_by_id(
        &self,
        role: StaffRole,
        id: i64,
    ) -> StorageResult<Option<StaffAccount>> {
        let sql = format!(
            "SELECT {STAFF_COLUMNS} FROM {} WHERE id = $1",
            staff_table(role)
        );
        let row: Option<StaffTuple> = query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to load staff account", e))?;
        row.map(|r| staff_from_row(role, r)).transpose()
    }

    async fn staff_username_or_email_taken(
        &self,
        role: StaffRole,
        username: &str,
        email: Option<&str>,
    ) -> StorageResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE username = $1 OR ($2::text IS NOT NULL AND email = $2))",
            staff_table(role)
        );
        query_scalar(&sql)
            .bind(username)
            .bind(email)
            .fetch_one(self.pool())
            .await
            .map_err(|e| query_error("Failed to check staff account", e))
    }

    async fn staff_username_taken(&self, role: StaffRole, username: &str) -> StorageResult<bool> {
        self.staff_username_or_email_taken(role, username, None)
            .await
    }

    async fn create_staff(&self, staff: NewStaff) -> StorageResult<StaffAccount> {
        let sql = format!(
            r#"INSERT INTO {} (username, full_name, email, specialization, password_hash, status)
               VALUES ($1, $2, $3, $4, $5, 'PENDING')
               RETURNING {STAFF_COLUMNS}"#,
            staff_table(staff.role)
        );
        let row: StaffTuple = query_as(&sql)
            .bind(&staff.username)
            .bind(&staff.full_name)
            .bind(&staff.email)
            .bind(&staff.specialization)
            .bind(&staff.password_hash)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::conflict("Username already exists")
                } else {
                    query_error("Failed to create staff account", e)
                }
            })?;
        staff_from_row(staff.role, row)
    }

    async fn update_staff_profile(
        &self,
        role: StaffRole,
        username: &str,
        update: StaffProfileUpdate,
    ) -> StorageResult<()> {
        let sql = format!(
            "UPDATE {} SET full_name = $1, email = $2 WHERE username = $3",
            staff_table(role)
        );
        let result = query(&sql)
            .bind(&update.full_name)
            .bind(&update.email)
            .bind(username)
            .execute(self.pool())
            .await
            .map_err(|e| query_error("Failed to update staff profile", e))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(role.title(), username));
        }
        Ok(())
    }

    async fn set_staff_status(
        &self,
        role: StaffRole,
        id: i64,
        status: ApprovalStatus,
    ) -> StorageResult<StaffAccount> {
        let sql = format!(
            "UPDATE {} SET status = $1 WHERE id = $2 RETURNING {STAFF_COLUMNS}",
            staff_table(role)
        );
        let row: Option<StaffTuple> = query_as(&sql)
            .bind(status.as_str())
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to update staff status", e))?;
        let row = row.ok_or_else(|| StorageError::not_found(role.title(), id))?;
        staff_from_row(role, row)
    }

    async fn count_staff_by_status(
        &self,
        role: StaffRole,
        status: ApprovalStatus,
    ) -> StorageResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE status = $1",
            staff_table(role)
        );
        let count: i64 = query_scalar(&sql)
            .bind(status.as_str())
            .fetch_one(self.pool())
            .await
            .map_err(|e| query_error("Failed to count staff accounts", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_staff_by_status(
        &self,
        role: StaffRole,
        status: ApprovalStatus,
    ) -> StorageResult<Vec<StaffAccount>> {
        let sql = format!(
            "SELECT {STAFF_COLUMNS} FROM {} WHERE status = $1 ORDER BY id",
            staff_table(role)
        );
        let rows: Vec<StaffTuple> = query_as(&sql)
            .bind(status.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("Failed to list staff accounts", e))?;
        rows.into_iter()
            .map(|r| staff_from_row(role, r))
            .collect()
    }
}

impl PostgresStorage {
    async fn patient_where(&self, clause: &str, value: &str) -> StorageResult<Option<PatientAccount>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE {clause} LIMIT 1");
        let row: Option<PatientTuple> = query_as(&sql)
            .bind(value)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to load patient account", e))?;
        row.map(patient_from_row).transpose()
    }

    async fn patient_exists(&self, column: &str, value: &str) -> StorageResult<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM patients WHERE {column} = $1)");
        query_scalar(&sql)
            .bind(value)
            .fetch_one(self.pool())
            .await
            .map_err(|e| query_error("Failed to check patient account", e))
    }
}

#[async_trait]
impl PatientAccountStore for PostgresStorage {
    async fn find_patient_by_login(
        &self,
        identifier: &str,
    ) -> StorageResult<Option<PatientAccount>> {
        self.patient_where("patient_id = $1 OR email = $1 OR phone = $1", identifier)
            .await
    }

    async fn find_patient_by_contact(
        &self,
        identifier: &str,
    ) -> StorageResult<Option<PatientAccount>> {
        self.patient_where("email = $1 OR phone = $1", identifier)
            .await
    }

    async fn find_patient_by_id(&self, id: i64) -> StorageResult<Option<PatientAccount>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        let row: Option<PatientTuple> = query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to load patient account", e))?;
        row.map(patient_from_row).transpose()
    }

    async fn patient_email_taken(&self, email: &str) -> StorageResult<bool> {
        self.patient_exists("email", email).await
    }

    async fn patient_phone_taken(&self, phone: &str) -> StorageResult<bool> {
        self.patient_exists("phone", phone).await
    }

    async fn patient_id_taken(&self, patient_id: &str) -> StorageResult<bool> {
        self.patient_exists("patient_id", patient_id).await
    }

    async fn create_patient(&self, account: NewPatientAccount) -> StorageResult<PatientAccount> {
        let sql = format!(
            r#"INSERT INTO patients (patient_id, name, email, phone, password_hash, is_approved)
               VALUES ($1, $2, $3, $4, $5, 0)
               RETURNING {PATIENT_COLUMNS}"#
        );
        let row: PatientTuple = query_as(&sql)
            .bind(&account.patient_id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.phone)
            .bind(&account.password_hash)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::conflict("Patient ID already exists")
                } else {
                    query_error("Failed to create patient account", e)
                }
            })?;
        patient_from_row(row)
    }

    async fn update_patient_profile(
        &self,
        id: i64,
        name: &str,
        email: &str,
    ) -> StorageResult<()> {
        let result = query("UPDATE patients SET name = $1, email = $2 WHERE id = $3")
            .bind(name)
            .bind(email)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::conflict("Email already used")
                } else {
                    query_error("Failed to update patient profile", e)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Patient", id));
        }
        Ok(())
    }

    async fn set_patient_approval(
        &self,
        id: i64,
        approval: PatientApproval,
    ) -> StorageResult<PatientAccount> {
        let sql =
            format!("UPDATE patients SET is_approved = $1 WHERE id = $2 RETURNING {PATIENT_COLUMNS}");
        let row: Option<PatientTuple> = query_as(&sql)
            .bind(approval.as_i16())
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to update patient approval", e))?;
        let row = row.ok_or_else(|| StorageError::not_found("Patient", id))?;
        patient_from_row(row)
    }

    async fn set_patient_password(&self, id: i64, password_hash: &str) -> StorageResult<()> {
        let result = query("UPDATE patients SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| query_error("Failed to update patient password", e))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Patient", id));
        }
        Ok(())
    }

    async fn count_approved_patients(&self) -> StorageResult<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM patients WHERE is_approved = 1")
            .fetch_one(self.pool())
            .await
            .map_err(|e| query_error("Failed to count patients", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_pending_patients(&self) -> StorageResult<Vec<PatientAccount>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE is_approved = 0 ORDER BY id");
        let rows: Vec<PatientTuple> = query_as(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("Failed to list patients", e))?;
        rows.into_iter().map(patient_from_row).collect()
    }
}

#[async_trait]
impl AdminStore for PostgresStorage {
    async fn find_admin(&self, username_or_email: &str) -> StorageResult<Option<AdminAccount>> {
        let row: Option<(i64, String, Option<String>, String)> = query_as(
            "SELECT id, username, email, password_hash FROM admins WHERE username = $1 OR email = $1 LIMIT 1",
        )
        .bind(username_or_email)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| query_error("Failed to load admin", e))?;
        Ok(row.map(|(id, username, email, password_hash)| AdminAccount {
            id,
            username,
            email,
            password_hash,
        }))
    }

    async fn create_admin(&self, admin: NewAdmin) -> StorageResult<AdminAccount> {
        let (id,): (i64,) = query_as(
            "INSERT INTO admins (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::conflict("Admin already exists")
            } else {
                query_error("Failed to create admin", e)
            }
        })?;
        Ok(AdminAccount {
            id,
            username: admin.username,
            email: admin.email,
            password_hash: admin.password_hash,
        })
    }
}

#[async_trait]
impl AuditStore for PostgresStorage {
    async fn record_audit(&self, entry: NewAuditEntry) -> StorageResult<()> {
        query(
            r#"INSERT INTO audit_logs (user_id, user_role, action_type, target_id, target_role, details)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(entry.user_id)
        .bind(entry.user_role.as_str())
        .bind(&entry.action_type)
        .bind(entry.target_id)
        .bind(entry.target_role.map(|r| r.as_str()))
        .bind(&entry.details)
        .execute(self.pool())
        .await
        .map_err(|e| query_error("Failed to record audit entry", e))?;
        Ok(())
    }

    async fn recent_targeted_audit(&self, limit: u32) -> StorageResult<Vec<AuditEntry>> {
        let rows: Vec<AuditTuple> = query_as(
            r#"SELECT id, user_id, user_role, action_type, target_id, target_role, details, created_at
               FROM audit_logs
               WHERE target_role IS NOT NULL
               ORDER BY id DESC
               LIMIT $1"#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("Failed to load audit log", e))?;
        rows.into_iter().map(audit_from_row).collect()
    }
}
