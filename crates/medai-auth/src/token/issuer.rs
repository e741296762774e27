//! Per-role token issuing.

use medai_core::Role;
use time::{Duration, OffsetDateTime};

use super::jwt::{AccessClaims, JwtError, JwtService, ResetClaims, SigningAlgorithm};

/// Signing secret of each role, plus the one for password reset links.
#[derive(Debug, Clone)]
pub struct RoleSecrets {
    pub admin: String,
    pub doctor: String,
    pub receptionist: String,
    pub patient: String,
    pub patient_reset: String,
}

/// Validity window of each token kind.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    /// Receptionist and patient tokens.
    pub access: Duration,
    pub admin: Duration,
    pub doctor: Duration,
    pub reset: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(1440),
            admin: Duration::hours(6),
            doctor: Duration::hours(12),
            reset: Duration::minutes(15),
        }
    }
}

/// Issues and validates login and reset tokens, each role under its own secret.
#[derive(Debug)]
pub struct TokenIssuer {
    admin: JwtService,
    doctor: JwtService,
    receptionist: JwtService,
    patient: JwtService,
    reset: JwtService,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    /// # Errors
    /// Returns `JwtError::InvalidKey` if any secret is empty.
    pub fn new(
        algorithm: SigningAlgorithm,
        secrets: &RoleSecrets,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, JwtError> {
        Ok(Self {
            admin: JwtService::new(&secrets.admin, algorithm)?,
            doctor: JwtService::new(&secrets.doctor, algorithm)?,
            receptionist: JwtService::new(&secrets.receptionist, algorithm)?,
            patient: JwtService::new(&secrets.patient, algorithm)?,
            reset: JwtService::new(&secrets.patient_reset, algorithm)?,
            lifetimes,
        })
    }

    fn service(&self, role: Role) -> &JwtService {
        match role {
            Role::Admin => &self.admin,
            Role::Doctor => &self.doctor,
            Role::Receptionist => &self.receptionist,
            Role::Patient => &self.patient,
        }
    }

    #[must_use]
    pub fn lifetime(&self, role: Role) -> Duration {
        match role {
            Role::Admin => self.lifetimes.admin,
            Role::Doctor => self.lifetimes.doctor,
            Role::Receptionist | Role::Patient => self.lifetimes.access,
        }
    }

    /// Signs a login token for `role`.
    pub fn issue(
        &self,
        role: Role,
        sub: Option<String>,
        id: Option<i64>,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessClaims {
            sub,
            id,
            role,
            iat: now.unix_timestamp(),
            exp: (now + self.lifetime(role)).unix_timestamp(),
        };
        self.service(role).encode(&claims)
    }

    pub fn issue_admin(&self, id: i64) -> Result<String, JwtError> {
        self.issue(Role::Admin, None, Some(id))
    }

    pub fn issue_doctor(&self, username: &str, id: i64) -> Result<String, JwtError> {
        self.issue(Role::Doctor, Some(username.to_string()), Some(id))
    }

    pub fn issue_receptionist(&self, username: &str) -> Result<String, JwtError> {
        self.issue(Role::Receptionist, Some(username.to_string()), None)
    }

    pub fn issue_patient(&self, id: i64) -> Result<String, JwtError> {
        self.issue(Role::Patient, None, Some(id))
    }

    /// Validates a token against the secret of `role`.
    ///
    /// The role claim is not checked here; callers decide how to treat a
    /// token whose claim names a different role.
    pub fn verify(&self, role: Role, token: &str) -> Result<AccessClaims, JwtError> {
        self.service(role).decode(token)
    }

    /// Signs a password reset token for a patient account.
    pub fn issue_reset(&self, patient_id: i64) -> Result<String, JwtError> {
        let exp = OffsetDateTime::now_utc() + self.lifetimes.reset;
        self.reset.encode(&ResetClaims {
            id: patient_id,
            exp: exp.unix_timestamp(),
        })
    }

    /// Returns the patient account id of a valid reset token.
    pub fn verify_reset(&self, token: &str) -> Result<i64, JwtError> {
        self.reset
            .decode::<ResetClaims>(token)
            .map(|claims| claims.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> RoleSecrets {
        RoleSecrets {
            admin: "admin-secret".into(),
            doctor: "doctor-secret".into(),
            receptionist: "receptionist-secret".into(),
            patient: "patient-secret".into(),
            patient_reset: "reset-secret".into(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SigningAlgorithm::HS256, &secrets(), TokenLifetimes::default()).unwrap()
    }

    #[test]
    fn doctor_token_carries_username_and_id() {
        let issuer = issuer();
        let token = issuer.issue_doctor("drsmith", 4).unwrap();
        let claims = issuer.verify(Role::Doctor, &token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("drsmith"));
        assert_eq!(claims.id, Some(4));
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.exp - claims.iat, 12 * 3600);
    }

    #[test]
    fn tokens_do_not_cross_roles() {
        let issuer = issuer();
        let token = issuer.issue_patient(1).unwrap();
        assert!(issuer.verify(Role::Admin, &token).is_err());
        assert!(issuer.verify(Role::Patient, &token).is_ok());
    }

    #[test]
    fn lifetimes_follow_role() {
        let issuer = issuer();
        assert_eq!(issuer.lifetime(Role::Admin), Duration::hours(6));
        assert_eq!(issuer.lifetime(Role::Receptionist), Duration::minutes(1440));
        assert_eq!(issuer.lifetime(Role::Patient), Duration::minutes(1440));
    }

    #[test]
    fn reset_tokens_use_their_own_secret() {
        let issuer = issuer();
        let reset = issuer.issue_reset(9).unwrap();
        assert_eq!(issuer.verify_reset(&reset).unwrap(), 9);

        let login = issuer.issue_patient(9).unwrap();
        assert!(issuer.verify_reset(&login).is_err());
    }

    #[test]
    fn expired_reset_token_is_rejected() {
        let lifetimes = TokenLifetimes {
            reset: Duration::minutes(-30),
            ..TokenLifetimes::default()
        };
        let issuer = TokenIssuer::new(SigningAlgorithm::HS256, &secrets(), lifetimes).unwrap();
        let reset = issuer.issue_reset(9).unwrap();
        assert!(matches!(issuer.verify_reset(&reset), Err(JwtError::Expired)));
    }

    #[test]
    fn empty_secret_fails_construction() {
        let mut bad = secrets();
        bad.patient_reset.clear();
        assert!(TokenIssuer::new(SigningAlgorithm::HS256, &bad, TokenLifetimes::default()).is_err());
    }
}
