//! # HTTP Server
//!
//! Main HTTP server combining all endpoint routers.
//!
//! Shutdown is graceful: on Ctrl-C or SIGTERM the listener stops accepting
//! and a shutdown flag tells every gateway connection to unsubscribe and close,
//! including connections whose upgrade completes after the flag was set.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth_routes::{auth_routes, AuthState};
use super::config::HttpServerConfig;
use super::gateway_routes::{gateway_routes, GatewayState};
use super::ingest_routes::{ingest_routes, IngestState};
use super::observability_routes::health_routes;
use crate::auth::JwtManager;
use crate::realtime::{Broker, Ingestor};

/// HTTP server for ingestion and the WebSocket gateway
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    shutdown: watch::Sender<bool>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, broker: Arc<Broker>, tokens: Arc<JwtManager>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let router = Self::build_router(&config, broker, tokens, shutdown.clone());
        Self {
            config,
            router,
            shutdown,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &HttpServerConfig,
        broker: Arc<Broker>,
        tokens: Arc<JwtManager>,
        shutdown: watch::Sender<bool>,
    ) -> Router {
        let ingest_state = Arc::new(IngestState::new(Ingestor::new(broker.clone())));
        let gateway_state = Arc::new(GatewayState {
            broker: broker.clone(),
            verifier: tokens.clone(),
            shutdown,
        });
        let auth_state = Arc::new(AuthState { tokens });

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let api = ingest_routes(ingest_state)
            .merge(gateway_routes(gateway_state))
            .merge(auth_routes(auth_state));

        Router::new()
            .merge(health_routes(broker))
            .nest("/api", api)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Setting this to `true` closes every open gateway connection
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "realtimer listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                signal.await;
                tracing::info!("shutdown requested, closing gateway connections");
                shutdown.send_replace(true);
            })
            .await?;

        tracing::info!("http server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
