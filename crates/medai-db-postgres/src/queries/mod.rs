//! Storage trait implementations for [`crate::PostgresStorage`].

mod accounts;
mod clinical;
