//! Observability HTTP Routes
//!
//! Liveness check for load balancers and orchestrators.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::realtime::Broker;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,

    /// Topics with at least one live subscriber
    pub topics: usize,
}

/// Health check route at root `/health`
pub fn health_routes(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(broker)
}

async fn health_handler(State(broker): State<Arc<Broker>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        topics: broker.topic_count().await,
    };

    (StatusCode::OK, Json(response))
}
