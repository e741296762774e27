use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use medai_core::{ApprovalStatus, Disease, PatientApproval, StaffRole, now_utc};
use medai_storage::{
    AdminAccount, AdminStore, AuditEntry, AuditStore, ClinicalNotes, ClinicalStore, CursorEntry,
    HistorySummary, NewAdmin, NewAuditEntry, NewPatientAccount, NewStaff, PatientAccount,
    PatientAccountStore, PatientDetails, PredictionRow, StaffAccount, StaffProfileUpdate,
    StaffStore, StorageError, StorageResult, StoredOutcome, VisitIngest, VisitQuery, VisitRow,
    VisitSelector, VitalsSnapshot,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Rows of one id-keyed table with its id sequence.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> &T {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.entry(id).or_insert_with(|| build(id))
    }
}

#[derive(Debug)]
struct StoredVisit {
    patient_id: String,
    created_at: OffsetDateTime,
    clinical: ClinicalNotes,
    vitals: VitalsSnapshot,
    prediction: PredictionRow,
}

#[derive(Debug, Default)]
struct Tables {
    doctors: Table<StaffAccount>,
    receptionists: Table<StaffAccount>,
    patients: Table<PatientAccount>,
    admins: Table<AdminAccount>,
    audit: Table<AuditEntry>,
    patient_details: HashMap<String, PatientDetails>,
    visits: BTreeMap<String, StoredVisit>,
}

impl Tables {
    fn staff(&self, role: StaffRole) -> &Table<StaffAccount> {
        match role {
            StaffRole::Doctor => &self.doctors,
            StaffRole::Receptionist => &self.receptionists,
        }
    }

    fn staff_mut(&mut self, role: StaffRole) -> &mut Table<StaffAccount> {
        match role {
            StaffRole::Doctor => &mut self.doctors,
            StaffRole::Receptionist => &mut self.receptionists,
        }
    }

    fn linked_patient_id(&self, account_id: i64) -> Option<&str> {
        self.patients
            .rows
            .get(&account_id)
            .map(|p| p.patient_id.as_str())
    }

    fn selects(&self, selector: &VisitSelector, visit: &StoredVisit) -> bool {
        match selector {
            VisitSelector::ByAccount(account_id) => {
                self.linked_patient_id(*account_id) == Some(visit.patient_id.as_str())
            }
            VisitSelector::ByPatientIdOrPhone(q) => self
                .patient_details
                .get(&visit.patient_id)
                .is_some_and(|pd| pd.patient_id == *q || pd.phone.as_deref() == Some(q)),
        }
    }

    fn matching<'a>(&'a self, query: &'a VisitQuery) -> impl Iterator<Item = (&'a String, &'a StoredVisit)> {
        self.visits
            .iter()
            .filter(move |(_, v)| self.selects(&query.selector, v) && query.in_window(v.created_at))
    }

    fn row(&self, serial: &str, visit: &StoredVisit) -> VisitRow {
        let patient = self
            .patient_details
            .get(&visit.patient_id)
            .cloned()
            .unwrap_or_else(|| PatientDetails {
                patient_id: visit.patient_id.clone(),
                ..PatientDetails::default()
            });
        VisitRow {
            serial: serial.to_string(),
            created_at: visit.created_at,
            patient,
            vitals: visit.vitals.clone(),
            clinical: visit.clinical.clone(),
            outcomes: stored_outcomes(&visit.prediction),
        }
    }
}

fn stored_outcomes(prediction: &PredictionRow) -> BTreeMap<Disease, StoredOutcome> {
    prediction
        .outcomes
        .iter()
        .map(|(disease, outcome)| (*disease, StoredOutcome::from(outcome)))
        .collect()
}

/// In-memory backend. All tables sit behind one lock so multi-table writes
/// such as visit ingestion are atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests a visit with an explicit creation time.
    pub async fn ingest_visit_at(
        &self,
        visit: VisitIngest,
        created_at: OffsetDateTime,
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.visits.contains_key(&visit.serial) {
            return Err(StorageError::conflict(
                "This prescription has already been uploaded",
            ));
        }

        tracing::debug!(serial = %visit.serial, patient_id = %visit.patient.patient_id, "ingesting visit");
        let patient_id = visit.patient.patient_id.clone();
        tables
            .patient_details
            .insert(patient_id.clone(), visit.patient);
        tables.visits.insert(
            visit.serial,
            StoredVisit {
                patient_id,
                created_at,
                clinical: visit.clinical,
                vitals: visit.vitals,
                prediction: visit.prediction,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StaffStore for InMemoryStorage {
    async fn find_staff_by_username(
        &self,
        role: StaffRole,
        username: &str,
    ) -> StorageResult<Option<StaffAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .staff(role)
            .rows
            .values()
            .find(|s| s.username == username)
            .cloned())
    }

    async fn find_staff_by_id(
        &self,
        role: StaffRole,
        id: i64,
    ) -> StorageResult<Option<StaffAccount>> {
        let tables = self.tables.read().await;
        Ok(tables.staff(role).rows.get(&id).cloned())
    }

    async fn staff_username_or_email_taken(
        &self,
        role: StaffRole,
        username: &str,
        email: Option<&str>,
    ) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.staff(role).rows.values().any(|s| {
            s.username == username || (email.is_some() && s.email.as_deref() == email)
        }))
    }

    async fn staff_username_taken(&self, role: StaffRole, username: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .staff(role)
            .rows
            .values()
            .any(|s| s.username == username))
    }

    async fn create_staff(&self, staff: NewStaff) -> StorageResult<StaffAccount> {
        let mut tables = self.tables.write().await;
        let table = tables.staff_mut(staff.role);
        if table.rows.values().any(|s| s.username == staff.username) {
            return Err(StorageError::conflict("Username already exists"));
        }
        let created = table.insert_with(|id| StaffAccount {
            id,
            role: staff.role,
            username: staff.username,
            full_name: staff.full_name,
            email: staff.email,
            specialization: staff.specialization,
            password_hash: staff.password_hash,
            status: ApprovalStatus::Pending,
            created_at: now_utc(),
        });
        Ok(created.clone())
    }

    async fn update_staff_profile(
        &self,
        role: StaffRole,
        username: &str,
        update: StaffProfileUpdate,
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let account = tables
            .staff_mut(role)
            .rows
            .values_mut()
            .find(|s| s.username == username)
            .ok_or_else(|| StorageError::not_found(role.title(), username))?;
        account.full_name = update.full_name;
        account.email = update.email;
        Ok(())
    }

    async fn set_staff_status(
        &self,
        role: StaffRole,
        id: i64,
        status: ApprovalStatus,
    ) -> StorageResult<StaffAccount> {
        let mut tables = self.tables.write().await;
        let account = tables
            .staff_mut(role)
            .rows
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(role.title(), id))?;
        account.status = status;
        Ok(account.clone())
    }

    async fn count_staff_by_status(
        &self,
        role: StaffRole,
        status: ApprovalStatus,
    ) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .staff(role)
            .rows
            .values()
            .filter(|s| s.status == status)
            .count() as u64)
    }

    async fn list_staff_by_status(
        &self,
        role: StaffRole,
        status: ApprovalStatus,
    ) -> StorageResult<Vec<StaffAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .staff(role)
            .rows
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatientAccountStore for InMemoryStorage {
    async fn find_patient_by_login(
        &self,
        identifier: &str,
    ) -> StorageResult<Option<PatientAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .find(|p| {
                p.patient_id == identifier
                    || p.email.as_deref() == Some(identifier)
                    || p.phone.as_deref() == Some(identifier)
            })
            .cloned())
    }

    async fn find_patient_by_contact(
        &self,
        identifier: &str,
    ) -> StorageResult<Option<PatientAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .find(|p| {
                p.email.as_deref() == Some(identifier) || p.phone.as_deref() == Some(identifier)
            })
            .cloned())
    }

    async fn find_patient_by_id(&self, id: i64) -> StorageResult<Option<PatientAccount>> {
        let tables = self.tables.read().await;
        Ok(tables.patients.rows.get(&id).cloned())
    }

    async fn patient_email_taken(&self, email: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .any(|p| p.email.as_deref() == Some(email)))
    }

    async fn patient_phone_taken(&self, phone: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .any(|p| p.phone.as_deref() == Some(phone)))
    }

    async fn patient_id_taken(&self, patient_id: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .any(|p| p.patient_id == patient_id))
    }

    async fn create_patient(&self, account: NewPatientAccount) -> StorageResult<PatientAccount> {
        let mut tables = self.tables.write().await;
        if tables
            .patients
            .rows
            .values()
            .any(|p| p.patient_id == account.patient_id)
        {
            return Err(StorageError::conflict("Patient ID already exists"));
        }
        let created = tables.patients.insert_with(|id| PatientAccount {
            id,
            patient_id: account.patient_id,
            name: account.name,
            email: account.email,
            phone: account.phone,
            password_hash: account.password_hash,
            approval: PatientApproval::Pending,
            created_at: now_utc(),
        });
        Ok(created.clone())
    }

    async fn update_patient_profile(
        &self,
        id: i64,
        name: &str,
        email: &str,
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .patients
            .rows
            .values()
            .any(|p| p.id != id && p.email.as_deref() == Some(email))
        {
            return Err(StorageError::conflict("Email already used"));
        }
        let account = tables
            .patients
            .rows
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Patient", id))?;
        account.name = name.to_string();
        account.email = Some(email.to_string());
        Ok(())
    }

    async fn set_patient_approval(
        &self,
        id: i64,
        approval: PatientApproval,
    ) -> StorageResult<PatientAccount> {
        let mut tables = self.tables.write().await;
        let account = tables
            .patients
            .rows
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Patient", id))?;
        account.approval = approval;
        Ok(account.clone())
    }

    async fn set_patient_password(&self, id: i64, password_hash: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let account = tables
            .patients
            .rows
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Patient", id))?;
        account.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn count_approved_patients(&self) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .filter(|p| p.approval.is_approved())
            .count() as u64)
    }

    async fn list_pending_patients(&self) -> StorageResult<Vec<PatientAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .rows
            .values()
            .filter(|p| p.approval == PatientApproval::Pending)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AdminStore for InMemoryStorage {
    async fn find_admin(&self, username_or_email: &str) -> StorageResult<Option<AdminAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .admins
            .rows
            .values()
            .find(|a| {
                a.username == username_or_email || a.email.as_deref() == Some(username_or_email)
            })
            .cloned())
    }

    async fn create_admin(&self, admin: NewAdmin) -> StorageResult<AdminAccount> {
        let mut tables = self.tables.write().await;
        if tables
            .admins
            .rows
            .values()
            .any(|a| a.username == admin.username)
        {
            return Err(StorageError::conflict("Admin already exists"));
        }
        let created = tables.admins.insert_with(|id| AdminAccount {
            id,
            username: admin.username,
            email: admin.email,
            password_hash: admin.password_hash,
        });
        Ok(created.clone())
    }
}

#[async_trait]
impl AuditStore for InMemoryStorage {
    async fn record_audit(&self, entry: NewAuditEntry) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.audit.insert_with(|id| AuditEntry {
            id,
            user_id: entry.user_id,
            user_role: entry.user_role,
            action_type: entry.action_type,
            target_id: entry.target_id,
            target_role: entry.target_role,
            details: entry.details,
            created_at: now_utc(),
        });
        Ok(())
    }

    async fn recent_targeted_audit(&self, limit: u32) -> StorageResult<Vec<AuditEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .rows
            .values()
            .rev()
            .filter(|e| e.target_role.is_some())
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClinicalStore for InMemoryStorage {
    async fn disease_catalog(&self) -> StorageResult<Vec<(Disease, i32)>> {
        Ok(Disease::ALL.iter().map(|d| (*d, d.builtin_id())).collect())
    }

    async fn ingest_visit(&self, visit: VisitIngest) -> StorageResult<()> {
        self.ingest_visit_at(visit, now_utc()).await
    }

    async fn count_visits(&self, query: &VisitQuery) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.matching(query).count() as u64)
    }

    async fn list_visits(&self, query: &VisitQuery) -> StorageResult<Vec<VisitRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<VisitRow> = tables
            .matching(query)
            .map(|(serial, visit)| tables.row(serial, visit))
            .collect();
        query.sort_rows(&mut rows);
        Ok(rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn visit_detail(&self, account_id: i64, serial: &str) -> StorageResult<Option<VisitRow>> {
        let tables = self.tables.read().await;
        let selector = VisitSelector::ByAccount(account_id);
        Ok(tables
            .visits
            .get_key_value(serial)
            .filter(|(_, visit)| tables.selects(&selector, visit))
            .map(|(serial, visit)| tables.row(serial, visit)))
    }

    async fn visit_cursor(
        &self,
        account_id: i64,
        cursor: Option<OffsetDateTime>,
        limit: u32,
    ) -> StorageResult<Vec<CursorEntry>> {
        let tables = self.tables.read().await;
        let selector = VisitSelector::ByAccount(account_id);
        let mut entries: Vec<CursorEntry> = tables
            .visits
            .iter()
            .filter(|(_, v)| tables.selects(&selector, v))
            .filter(|(_, v)| cursor.is_none_or(|c| v.created_at < c))
            .map(|(serial, v)| CursorEntry {
                serial: serial.clone(),
                created_at: v.created_at,
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn history_summary(&self, account_id: i64) -> StorageResult<HistorySummary> {
        let tables = self.tables.read().await;
        let selector = VisitSelector::ByAccount(account_id);
        let mut summary = HistorySummary::default();
        for visit in tables.visits.values().filter(|v| tables.selects(&selector, v)) {
            summary.add_visit(&stored_outcomes(&visit.prediction));
        }
        Ok(summary)
    }
}
