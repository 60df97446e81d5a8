//! CLI command implementations
//!
//! `start` boots in a fixed order: configuration, logging, backend
//! connection, callout check, one reconciliation pass, then the HTTP
//! server. Anything that fails before the server is up is fatal, except a
//! reconciliation pass where some (not all) trigger changes failed.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;
use crate::auth::JwtManager;
use crate::config::RealtimerConfig;
use crate::http_server::HttpServer;
use crate::observability::init_logging;
use crate::realtime::Broker;
use crate::reconcile::{connect_backend, ReconcileError, ReconcileReport, Reconciler};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start { config } => start(&config),
        Command::Reconcile { config } => reconcile(&config),
        Command::Token { config, subject } => token(&config, &subject),
    }
}

fn runtime() -> CliResult<Runtime> {
    Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Connect to the configured database and run one pass
async fn reconcile_once(config: &RealtimerConfig) -> Result<ReconcileReport, ReconcileError> {
    let desired = config
        .desired_spec()
        .map_err(|e| ReconcileError::Configuration(e.to_string()))?;
    let callout = config
        .callout_target()
        .map_err(|e| ReconcileError::Configuration(e.to_string()))?;

    let backend = connect_backend(&config.database, callout).await?;
    backend.verify_callout().await?;

    Reconciler::new(backend).reconcile(&desired).await
}

/// Load config and install logging; shared by every command
fn boot(config_path: &Path) -> CliResult<RealtimerConfig> {
    let config = RealtimerConfig::load(config_path)?;
    init_logging(&config.logging)?;
    tracing::info!(config = %config_path.display(), "configuration loaded");
    Ok(config)
}

/// Reconcile triggers, then serve until shutdown
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = boot(config_path)?;
    let rt = runtime()?;

    rt.block_on(async {
        match reconcile_once(&config).await {
            Ok(report) => {
                tracing::info!(
                    created = report.created.len(),
                    dropped = report.dropped.len(),
                    unchanged = report.unchanged.len(),
                    "triggers in sync"
                );
            }
            Err(e) if !e.is_fatal() => {
                let failures = e.report().map(|r| r.failures.len()).unwrap_or_default();
                tracing::warn!(
                    failures,
                    error = %e,
                    "starting with partial trigger coverage"
                );
            }
            Err(e) => return Err(CliError::from(e)),
        }

        let broker = Arc::new(Broker::new());
        let tokens = Arc::new(JwtManager::new(config.auth.jwt_config()));
        let server = HttpServer::new(config.server.clone(), broker, tokens);

        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Run one reconciliation pass and print the report
pub fn reconcile(config_path: &Path) -> CliResult<()> {
    let config = boot(config_path)?;
    let rt = runtime()?;

    match rt.block_on(reconcile_once(&config)) {
        Ok(report) => write_response("ok", &report),
        Err(e) => {
            if let Some(report) = e.report() {
                write_response("error", report)?;
            }
            Err(e.into())
        }
    }
}

/// Print a freshly issued gateway token
pub fn token(config_path: &Path, subject: &str) -> CliResult<()> {
    let config = RealtimerConfig::load(config_path)?;
    let token = JwtManager::new(config.auth.jwt_config()).issue_token(subject)?;
    println!("{}", token);
    Ok(())
}
