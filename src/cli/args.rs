//! CLI argument definitions using clap
//!
//! Commands:
//! - realtimer start --config <path>
//! - realtimer reconcile --config <path>
//! - realtimer token --subject <id> --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Realtimer - relays database row changes to WebSocket subscribers
#[derive(Parser, Debug)]
#[command(name = "realtimer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile triggers, then serve ingestion and the gateway
    Start {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Run one reconciliation pass and print the report
    Reconcile {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Issue a gateway token for a subject id
    Token {
        /// Subject id carried by the token
        #[arg(long)]
        subject: String,

        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_defaults_config_path() {
        let cli = Cli::try_parse_from(["realtimer", "start"]).unwrap();
        match cli.command {
            Command::Start { config } => assert_eq!(config, PathBuf::from("realtimer.yaml")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_token_requires_subject() {
        assert!(Cli::try_parse_from(["realtimer", "token"]).is_err());

        let cli =
            Cli::try_parse_from(["realtimer", "token", "--subject", "42", "--config", "x.yaml"])
                .unwrap();
        match cli.command {
            Command::Token { subject, config } => {
                assert_eq!(subject, "42");
                assert_eq!(config, PathBuf::from("x.yaml"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
