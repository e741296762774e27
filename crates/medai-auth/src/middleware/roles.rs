//! Role-scoped authentication extractors.
//!
//! Each extractor reads the bearer token, validates it with the secret of its
//! role and checks the role claim:
//!
//! ```ignore
//! async fn system_stats(admin: AdminAuth, State(state): State<AppState>) -> ... {
//!     tracing::debug!(admin_id = admin.id, "reading stats");
//! }
//! ```

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use medai_core::Role;

use super::auth::{AuthState, bearer_token};
use crate::error::AuthError;
use crate::token::AccessClaims;

struct RoleRule {
    role: Role,
    invalid: &'static str,
    forbidden: &'static str,
}

const ADMIN: RoleRule = RoleRule {
    role: Role::Admin,
    invalid: "Invalid admin token",
    forbidden: "Admin access only",
};

const DOCTOR: RoleRule = RoleRule {
    role: Role::Doctor,
    invalid: "Invalid or expired token",
    forbidden: "Doctor access only",
};

const RECEPTIONIST: RoleRule = RoleRule {
    role: Role::Receptionist,
    invalid: "Invalid or expired token",
    forbidden: "Receptionist access only",
};

const PATIENT: RoleRule = RoleRule {
    role: Role::Patient,
    invalid: "Invalid token",
    forbidden: "Patient access only",
};

fn authorize<S>(parts: &Parts, state: &S, rule: &RoleRule) -> Result<AccessClaims, AuthError>
where
    AuthState: FromRef<S>,
{
    let auth_state = AuthState::from_ref(state);
    let token = bearer_token(parts)?;

    let claims = auth_state
        .issuer
        .verify(rule.role, token)
        .map_err(|e| {
            tracing::debug!(role = %rule.role, error = %e, "Failed to decode token");
            AuthError::unauthorized(rule.invalid)
        })?;

    if claims.role != rule.role {
        tracing::debug!(
            expected = %rule.role,
            actual = %claims.role,
            "Access denied: role mismatch"
        );
        return Err(AuthError::forbidden(rule.forbidden));
    }

    Ok(claims)
}

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authorize(parts, state, &ADMIN)?;
        let id = claims
            .id
            .ok_or_else(|| AuthError::unauthorized(ADMIN.invalid))?;
        Ok(Self { id })
    }
}

/// An authenticated doctor.
#[derive(Debug, Clone)]
pub struct DoctorAuth {
    pub username: String,
    pub id: Option<i64>,
}

impl<S> FromRequestParts<S> for DoctorAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authorize(parts, state, &DOCTOR)?;
        let username = claims
            .sub
            .ok_or_else(|| AuthError::unauthorized(DOCTOR.invalid))?;
        Ok(Self {
            username,
            id: claims.id,
        })
    }
}

/// An authenticated receptionist.
#[derive(Debug, Clone)]
pub struct ReceptionistAuth {
    pub username: String,
}

impl<S> FromRequestParts<S> for ReceptionistAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authorize(parts, state, &RECEPTIONIST)?;
        let username = claims
            .sub
            .ok_or_else(|| AuthError::unauthorized(RECEPTIONIST.invalid))?;
        Ok(Self { username })
    }
}

/// A validated patient token.
///
/// Only the signature and expiry are checked here. Whether the account still
/// exists and is approved is decided against storage by the server.
#[derive(Debug, Clone)]
pub struct PatientToken {
    pub id: i64,
}

impl<S> FromRequestParts<S> for PatientToken
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authorize(parts, state, &PATIENT)?;
        let id = claims
            .id
            .ok_or_else(|| AuthError::unauthorized(PATIENT.invalid))?;
        Ok(Self { id })
    }
}
