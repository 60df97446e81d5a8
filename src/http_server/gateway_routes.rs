//! Gateway HTTP Routes
//!
//! WebSocket endpoint for live subscribers. Token and topic are checked
//! before the upgrade so a rejected client gets a plain HTTP error.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::watch;

use super::ErrorResponse;
use crate::auth::TokenVerifier;
use crate::realtime::gateway::run_connection;
use crate::realtime::{Broker, GatewaySession, Topic};

pub struct GatewayState {
    pub broker: Arc<Broker>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Flips to `true` when the server starts shutting down
    pub shutdown: watch::Sender<bool>,
}

pub fn gateway_routes(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
    pub event: Option<String>,
    pub table: Option<String>,
}

async fn websocket_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<GatewayQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let mut session = GatewaySession::new(state.broker.clone());

    if let Err(e) = session.authenticate(state.verifier.as_ref(), query.token.as_deref()) {
        tracing::info!(connection = %session.connection_id(), error = %e, "gateway connection rejected");
        return ErrorResponse::from(e).into_response();
    }

    let topic = match Topic::from_params(query.event.as_deref(), query.table.as_deref()) {
        Ok(topic) => topic,
        Err(e) => {
            tracing::info!(connection = %session.connection_id(), error = %e, "gateway topic rejected");
            return ErrorResponse::from(e).into_response();
        }
    };

    let Some(ws) = ws else {
        return ErrorResponse::new("expected a WebSocket upgrade request", 426).into_response();
    };

    let shutdown = state.shutdown.subscribe();
    ws.on_upgrade(move |socket| run_connection(session, topic, socket, shutdown))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{JwtConfig, JwtManager};

    fn setup() -> (Router, Arc<JwtManager>) {
        let tokens = Arc::new(JwtManager::new(JwtConfig {
            secret: "gateway_route_secret".to_string(),
            ..JwtConfig::default()
        }));
        let (shutdown, _) = watch::channel(false);
        let state = Arc::new(GatewayState {
            broker: Arc::new(Broker::new()),
            verifier: tokens.clone(),
            shutdown,
        });
        (gateway_routes(state), tokens)
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _) = setup();
        assert_eq!(
            status_of(app, "/ws?event=insert&table=orders").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let (app, _) = setup();
        assert_eq!(
            status_of(app, "/ws?token=abc.def.ghi&event=insert&table=orders").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_token_checked_before_topic() {
        let (app, _) = setup();
        assert_eq!(status_of(app, "/ws").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_table_is_bad_request() {
        let (app, tokens) = setup();
        let token = tokens.issue_token("user-1").unwrap();

        let uri = format!("/ws?token={}&event=insert", token);
        assert_eq!(status_of(app, &uri).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_event_is_bad_request() {
        let (app, tokens) = setup();
        let token = tokens.issue_token("user-1").unwrap();

        let uri = format!("/ws?token={}&event=merge&table=orders", token);
        assert_eq!(status_of(app, &uri).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_plain_request_needs_upgrade() {
        let (app, tokens) = setup();
        let token = tokens.issue_token("user-1").unwrap();

        let uri = format!("/ws?token={}&event=insert&table=orders", token);
        assert_eq!(status_of(app, &uri).await, StatusCode::UPGRADE_REQUIRED);
    }
}
