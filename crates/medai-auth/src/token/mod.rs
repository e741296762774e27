//! Token issuing and validation.

pub mod issuer;
pub mod jwt;

pub use issuer::{RoleSecrets, TokenIssuer, TokenLifetimes};
pub use jwt::{AccessClaims, JwtError, JwtService, ResetClaims, SigningAlgorithm};
