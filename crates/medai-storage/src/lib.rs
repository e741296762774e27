//! # medai-storage
//!
//! Storage abstraction for the MedAI server.
//!
//! Defines the record types and the traits every backend implements, plus the
//! aggregation that turns joined visit rows into history documents. Backends
//! live in `medai-db-memory` and `medai-db-postgres`.
//!
//! ```ignore
//! use medai_storage::{DynStorage, VisitDocument, VisitQuery, VisitSelector};
//!
//! async fn latest(storage: &DynStorage, account: i64) -> StorageResult<Vec<VisitDocument>> {
//!     let query = VisitQuery::new(VisitSelector::ByAccount(account), 1, 10);
//!     let rows = storage.list_visits(&query).await?;
//!     Ok(rows.iter().map(VisitDocument::from_row).collect())
//! }
//! ```

pub mod clinical;
mod error;
pub mod history;
pub mod records;
mod traits;

pub use clinical::{
    ClinicalNotes, CursorEntry, DiseaseOutcome, HistorySummary, PatientDetails, PredictionRow,
    SortField, SortOrder, StoredOutcome, VisitIngest, VisitQuery, VisitRow, VisitSelector,
    VitalsSnapshot,
};
pub use error::{StorageError, StorageResult};
pub use history::VisitDocument;
pub use records::{
    AdminAccount, AuditEntry, NewAdmin, NewAuditEntry, NewPatientAccount, NewStaff,
    PatientAccount, StaffAccount, StaffProfileUpdate, actions,
};
pub use traits::{
    AdminStore, AuditStore, ClinicalStore, DynStorage, MedaiStorage, PatientAccountStore,
    StaffStore,
};
