//! CLI module for realtimer
//!
//! Provides command-line interface for:
//! - start: reconcile triggers, then serve ingestion and the gateway
//! - reconcile: one-shot reconciliation pass with a JSON report
//! - token: issue a gateway token

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{reconcile, run, run_command, start, token};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_response_to};
