//! Ingestion HTTP Routes
//!
//! The endpoint database triggers post rows to.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ErrorResponse;
use crate::realtime::{Ingestor, PublishReport};

pub struct IngestState {
    pub ingestor: Ingestor,
}

impl IngestState {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }
}

pub fn ingest_routes(state: Arc<IngestState>) -> Router {
    Router::new()
        .route("/db", post(ingest_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    pub table: Option<String>,
    pub event: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl From<PublishReport> for IngestResponse {
    fn from(report: PublishReport) -> Self {
        Self {
            matched: report.matched,
            delivered: report.delivered,
            failed: report.failed,
        }
    }
}

async fn ingest_handler(
    State(state): State<Arc<IngestState>>,
    Query(query): Query<IngestQuery>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ErrorResponse> {
    match state
        .ingestor
        .ingest(query.table.as_deref(), query.event.as_deref(), &body)
        .await
    {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => {
            tracing::warn!(
                table = query.table.as_deref().unwrap_or_default(),
                operation = query.event.as_deref().unwrap_or_default(),
                error = %e,
                "rejected trigger callout"
            );
            Err(e.into())
        }
    }
}
