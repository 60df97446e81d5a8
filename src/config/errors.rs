//! Configuration error types

use thiserror::Error;

use crate::reconcile::ReconcileError;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors; all of them stop startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    Load { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ReconcileError> for ConfigError {
    fn from(err: ReconcileError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}
