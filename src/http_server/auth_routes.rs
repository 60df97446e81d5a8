//! Auth HTTP Routes
//!
//! Issues gateway tokens for a subject id.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ErrorResponse;
use crate::auth::JwtManager;

/// Shared auth state
pub struct AuthState {
    pub tokens: Arc<JwtManager>,
}

pub fn auth_routes(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/auth", get(issue_token_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

async fn issue_token_handler(
    State(state): State<Arc<AuthState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let subject = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ErrorResponse::new("Missing required query parameter `id`", 400))?;

    let token = state.tokens.issue_token(&subject)?;
    tracing::debug!(subject = %subject, "issued gateway token");

    Ok(Json(TokenResponse { token }))
}
