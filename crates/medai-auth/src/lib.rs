//! Authentication for the MedAI server.
//!
//! Every role signs its tokens with its own secret. Handlers take one of the
//! role extractors ([`AdminAuth`], [`DoctorAuth`], [`ReceptionistAuth`],
//! [`PatientToken`]) to require that role; the application state must expose
//! an [`AuthState`] through `FromRef`.

pub mod error;
pub mod middleware;
pub mod password;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use middleware::{AdminAuth, AuthState, DoctorAuth, PatientToken, ReceptionistAuth};
pub use password::{hash_password, verify_password};
pub use token::{
    AccessClaims, JwtError, JwtService, ResetClaims, RoleSecrets, SigningAlgorithm, TokenIssuer,
    TokenLifetimes,
};
