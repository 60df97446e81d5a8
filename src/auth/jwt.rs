//! # JWT Token Management
//!
//! HS256 tokens whose `sub` claim is the subscriber's subject id.
//! Validation is stateless; no lookup happens on connect.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::{Subject, TokenVerifier};

/// JWT claims for gateway tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject id
    pub sub: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,

    /// Audience
    pub aud: String,

    /// Issuer
    pub iss: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing
    pub secret: String,

    /// Token lifetime
    pub token_ttl: Duration,

    /// Issuer identifier
    pub issuer: String,

    /// Audience identifier
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            token_ttl: Duration::hours(24),
            issuer: "realtimer".to_string(),
            audience: "realtimer".to_string(),
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// Create a new JWT manager with the given configuration
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token for a subject id
    pub fn issue_token(&self, subject_id: &str) -> AuthResult<String> {
        if subject_id.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        let now = Utc::now();
        let exp = now + self.config.token_ttl;

        let claims = JwtClaims {
            sub: subject_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate a token and extract claims
    pub fn validate_token(&self, token: &str) -> AuthResult<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }
}

impl TokenVerifier for JwtManager {
    fn verify(&self, token: &str) -> AuthResult<Subject> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.validate_token(token)?;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(Subject { id: claims.sub })
    }
}
