//! # Real-Time Errors
//!
//! Error types for ingestion, fan-out and gateway connections.

use thiserror::Error;

use crate::auth::AuthError;

/// Result type for real-time operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Real-time errors
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    // ==================
    // Connection Errors
    // ==================
    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    // ==================
    // Authentication Errors
    // ==================
    /// Bad or missing gateway token
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    // ==================
    // Malformed Event Errors
    // ==================
    /// Required request parameter missing or empty
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Operation is not INSERT, UPDATE or DELETE
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Topic string does not split into operation and table
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Payload cannot be decoded at all
    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    // ==================
    // Delivery Errors
    // ==================
    /// Write to one subscriber failed
    #[error("Delivery to subscriber {subscriber} failed: {message}")]
    Delivery { subscriber: String, message: String },

    // ==================
    // Internal Errors
    // ==================
    /// Serialization of an outgoing message failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RealtimeError {
    /// Returns the close code for WebSocket
    pub fn close_code(&self) -> u16 {
        match self {
            RealtimeError::ConnectionClosed => 1000,
            RealtimeError::ConnectionError(_) => 1011,
            RealtimeError::Authentication(_) => 4003,
            RealtimeError::MissingParameter(_) => 4000,
            RealtimeError::InvalidOperation(_) => 4000,
            RealtimeError::InvalidTopic(_) => 4000,
            RealtimeError::MalformedEvent(_) => 1003,
            RealtimeError::Delivery { .. } => 4502,
            RealtimeError::Serialization(_) => 4500,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RealtimeError::Authentication(_) => 401,
            RealtimeError::MissingParameter(_)
            | RealtimeError::InvalidOperation(_)
            | RealtimeError::InvalidTopic(_)
            | RealtimeError::MalformedEvent(_) => 400,
            RealtimeError::ConnectionClosed
            | RealtimeError::ConnectionError(_)
            | RealtimeError::Delivery { .. }
            | RealtimeError::Serialization(_) => 500,
        }
    }

    /// Whether the event was rejected for its contents
    pub fn is_malformed_event(&self) -> bool {
        matches!(
            self,
            RealtimeError::MissingParameter(_)
                | RealtimeError::InvalidOperation(_)
                | RealtimeError::MalformedEvent(_)
        )
    }
}
