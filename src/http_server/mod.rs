//! # HTTP Server Module
//!
//! Thin axum surface over the relay.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/db` - Trigger callouts (webhook ingestion)
//! - `/api/ws` - WebSocket gateway
//! - `/api/auth` - Gateway token issuance

pub mod auth_routes;
pub mod config;
pub mod gateway_routes;
pub mod ingest_routes;
pub mod observability_routes;
pub mod server;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub use config::HttpServerConfig;
pub use server::HttpServer;

use crate::auth::AuthError;
use crate::realtime::RealtimeError;

/// JSON error body shared by every route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

impl From<RealtimeError> for ErrorResponse {
    fn from(err: RealtimeError) -> Self {
        Self::new(err.to_string(), err.status_code())
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        Self::new(err.to_string(), err.status_code())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
