//! In-memory storage backend for the MedAI server.
//!
//! Implements every `medai-storage` trait over plain maps behind a single
//! `tokio::sync::RwLock`. Used by tests and for running the server without
//! PostgreSQL.
//!
//! # Example
//!
//! ```ignore
//! use medai_db_memory::InMemoryStorage;
//! use medai_storage::StaffStore;
//!
//! let storage = InMemoryStorage::new();
//! let doctor = storage.find_staff_by_username(StaffRole::Doctor, "dr_rahman").await?;
//! ```

pub mod storage;

pub use medai_storage::{DynStorage, StorageError};
pub use storage::InMemoryStorage;

/// Creates a new in-memory backend behind the shared storage handle.
pub fn create_storage() -> DynStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
