//! # Configuration
//!
//! YAML file plus `REALTIMER__`-prefixed environment overrides, e.g.
//! `REALTIMER__DATABASE__PASSWORD` or `REALTIMER__SERVER__PORT`.
//!
//! Loading validates everything the service needs before it touches a
//! database: the watched tables, the callout URL and the token secret.

mod errors;

use std::path::Path;

use rust_cli_config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;

pub use errors::{ConfigError, ConfigResult};

use crate::auth::JwtConfig;
use crate::http_server::HttpServerConfig;
use crate::reconcile::{
    validate_identifier, CalloutTarget, DesiredSpec, IdentifierKind, TableSpec,
};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "realtimer.yaml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "REALTIMER";

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimerConfig {
    #[serde(default)]
    pub tables: Vec<TableSpec>,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: HttpServerConfig,

    pub callout: CalloutConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[serde(alias = "postgresql")]
    Postgres,
    Mysql,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    pub host: String,
    pub port: u16,

    /// Database name
    pub name: String,

    pub username: String,

    #[serde(default)]
    pub password: Option<SecretString>,

    /// Postgres schema holding the watched tables
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    4
}

impl DatabaseConfig {
    pub fn pg_connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    pub fn mysql_connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalloutConfig {
    /// Base URL the database triggers post rows to
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: SecretString,

    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    #[serde(default = "default_token_party")]
    pub issuer: String,

    #[serde(default = "default_token_party")]
    pub audience: String,
}

fn default_token_ttl_secs() -> i64 {
    86_400
}

fn default_token_party() -> String {
    "realtimer".to_string()
}

impl AuthConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.secret.expose_secret().clone(),
            token_ttl: chrono::Duration::seconds(self.token_ttl_secs),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl RealtimerConfig {
    /// Load from a YAML file with environment overrides and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let source = File::from(path).format(FileFormat::Yaml).required(true);
        Self::build(Config::builder().add_source(source), &path.display().to_string())
    }

    /// Parse a YAML document with environment overrides and validate.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let source = File::from_str(yaml, FileFormat::Yaml);
        Self::build(Config::builder().add_source(source), "<inline>")
    }

    fn build(
        builder: rust_cli_config::ConfigBuilder<rust_cli_config::builder::DefaultState>,
        origin: &str,
    ) -> ConfigResult<Self> {
        let load_error = |err: rust_cli_config::ConfigError| ConfigError::Load {
            path: origin.to_string(),
            message: err.to_string(),
        };

        let config: RealtimerConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(load_error)?
            .try_deserialize()
            .map_err(load_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Check every value that would otherwise fail later at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        self.desired_spec()?;
        self.callout_target()?;

        validate_identifier(IdentifierKind::Database, &self.database.name)?;
        if self.database.kind == DatabaseKind::Postgres {
            validate_identifier(IdentifierKind::Schema, &self.database.schema)?;
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        if self.auth.secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.secret must not be empty".to_string()));
        }
        if self.auth.token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn desired_spec(&self) -> ConfigResult<DesiredSpec> {
        Ok(DesiredSpec::new(self.tables.clone())?)
    }

    pub fn callout_target(&self) -> ConfigResult<CalloutTarget> {
        Ok(CalloutTarget::new(&self.callout.base_url)?)
    }
}
