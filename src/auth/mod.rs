//! # Gateway Auth
//!
//! Bearer tokens for gateway connections. A verified token yields an opaque
//! subject id; nothing else about the caller is used downstream.

pub mod errors;
pub mod jwt;

pub use errors::{AuthError, AuthResult};
pub use jwt::{JwtClaims, JwtConfig, JwtManager};

/// Authenticated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Opaque subject id carried by the token
    pub id: String,
}

/// Verifies bearer tokens presented at the gateway
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and extract its subject
    fn verify(&self, token: &str) -> AuthResult<Subject>;
}
