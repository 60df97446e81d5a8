//! # Auth Errors
//!
//! Error types for gateway token issuance and verification.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Token errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token presented
    #[error("Missing token")]
    MissingToken,

    /// JWT token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token carries no usable subject
    #[error("Token has no subject")]
    MissingSubject,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::TokenExpired
            | AuthError::InvalidSignature
            | AuthError::MissingSubject => 401,

            AuthError::TokenGenerationFailed => 500,
        }
    }

    /// Returns whether this error was caused by the caller
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
