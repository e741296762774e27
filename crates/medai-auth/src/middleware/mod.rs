//! Axum extractors that authenticate requests by role.

mod auth;
mod error;
mod roles;

pub use auth::{AuthState, bearer_token};
pub use roles::{AdminAuth, DoctorAuth, PatientToken, ReceptionistAuth};
