//! Postgres trigger backend
//!
//! Each managed trigger gets its own plpgsql function with the same
//! canonical name. The function builds a `jsonb` object from the row image
//! and posts it through the `http` extension's `http_post`. A failed callout
//! only raises a warning; the application's write still commits.

use async_trait::async_trait;
use pg_escape::{quote_identifier, quote_literal};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;

use super::backend::{CalloutTarget, ExistingTrigger, TriggerBackend};
use super::errors::{IdentifierKind, ReconcileError, ReconcileResult};
use super::identifier::validate_identifier;
use super::naming::{prefix_like_pattern, TriggerDescriptor};
use crate::config::DatabaseConfig;

/// Postgres truncates identifiers past this length
pub const PG_MAX_IDENTIFIER_LEN: usize = 63;

/// `jsonb_build_object` takes at most 100 arguments
const COLUMNS_PER_OBJECT: usize = 50;

/// Builds the DDL text; kept apart from the pool so it can be inspected
#[derive(Debug, Clone)]
pub struct PgStatements {
    schema: String,
    callout: CalloutTarget,
}

impl PgStatements {
    pub fn new(schema: impl Into<String>, callout: CalloutTarget) -> ReconcileResult<Self> {
        let schema = schema.into();
        validate_identifier(IdentifierKind::Schema, &schema)?;
        Ok(Self { schema, callout })
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(name))
    }

    /// `jsonb` expression for the row image, every value cast to text
    pub fn row_object(&self, trigger: &TriggerDescriptor, columns: &[String]) -> String {
        let image = trigger.operation.row_image();
        columns
            .chunks(COLUMNS_PER_OBJECT)
            .map(|chunk| {
                let pairs: Vec<String> = chunk
                    .iter()
                    .map(|column| {
                        format!(
                            "{}, {}.{}::text",
                            quote_literal(column),
                            image,
                            quote_identifier(column)
                        )
                    })
                    .collect();
                format!("jsonb_build_object({})", pairs.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" || ")
    }

    pub fn create_function(&self, trigger: &TriggerDescriptor, columns: &[String]) -> String {
        let url = self.callout.url_for(&trigger.table, trigger.operation);
        format!(
            "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger \
             LANGUAGE plpgsql AS $realtimer$\n\
             BEGIN\n    \
                 BEGIN\n        \
                     PERFORM http_post({url}, ({body})::text, 'application/json');\n    \
                 EXCEPTION WHEN OTHERS THEN\n        \
                     RAISE WARNING 'realtimer callout from % failed: %', TG_NAME, SQLERRM;\n    \
                 END;\n    \
                 RETURN NULL;\n\
             END;\n\
             $realtimer$",
            function = self.qualified(&trigger.canonical_name),
            url = quote_literal(&url),
            body = self.row_object(trigger, columns),
        )
    }

    pub fn create_trigger(&self, trigger: &TriggerDescriptor) -> String {
        format!(
            "CREATE TRIGGER {name} AFTER {operation} ON {table} \
             FOR EACH ROW EXECUTE FUNCTION {function}()",
            name = quote_identifier(&trigger.canonical_name),
            operation = trigger.operation.as_sql(),
            table = self.qualified(&trigger.table),
            function = self.qualified(&trigger.canonical_name),
        )
    }

    pub fn drop_trigger(&self, trigger: &ExistingTrigger) -> String {
        format!(
            "DROP TRIGGER IF EXISTS {} ON {}",
            quote_identifier(&trigger.name),
            self.qualified(&trigger.table)
        )
    }

    pub fn drop_function(&self, trigger: &ExistingTrigger) -> String {
        format!("DROP FUNCTION IF EXISTS {}()", self.qualified(&trigger.name))
    }
}

pub struct PostgresBackend {
    pool: PgPool,
    schema: String,
    statements: PgStatements,
}

impl PostgresBackend {
    pub async fn connect(config: &DatabaseConfig, callout: CalloutTarget) -> ReconcileResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.pg_connect_options())
            .await
            .map_err(|e| ReconcileError::catalog("connecting to postgres", e))?;

        tracing::info!(
            host = %config.host,
            database = %config.name,
            schema = %config.schema,
            "connected to postgres"
        );

        Self::from_pool(pool, config.schema.clone(), callout)
    }

    /// Wrap an existing pool; triggers are managed in `schema`
    pub fn from_pool(
        pool: PgPool,
        schema: impl Into<String>,
        callout: CalloutTarget,
    ) -> ReconcileResult<Self> {
        let schema = schema.into();
        let statements = PgStatements::new(schema.clone(), callout)?;
        Ok(Self {
            pool,
            schema,
            statements,
        })
    }

    async fn execute_atomically(&self, statements: [&str; 2]) -> ReconcileResult<()> {
        let mut tx = self.pool.begin().await.map_err(ReconcileError::statement)?;
        for statement in statements {
            execute(&mut tx, statement).await?;
        }
        tx.commit().await.map_err(ReconcileError::statement)
    }
}

async fn execute(conn: &mut PgConnection, statement: &str) -> ReconcileResult<()> {
    sqlx::query(statement)
        .execute(conn)
        .await
        .map_err(ReconcileError::statement)?;
    Ok(())
}

#[async_trait]
impl TriggerBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn max_identifier_len(&self) -> usize {
        PG_MAX_IDENTIFIER_LEN
    }

    async fn verify_callout(&self) -> ReconcileResult<()> {
        let installed: Option<String> =
            sqlx::query_scalar("SELECT extname::text FROM pg_extension WHERE extname = 'http'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ReconcileError::catalog("checking for the http extension", e))?;

        match installed {
            Some(_) => Ok(()),
            None => Err(ReconcileError::catalog(
                "checking for the http extension",
                "extension `http` is not installed",
            )),
        }
    }

    async fn list_existing_triggers(&self) -> ReconcileResult<Vec<ExistingTrigger>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT trigger_name::text, event_object_table::text \
             FROM information_schema.triggers \
             WHERE trigger_schema = $1 AND trigger_name::text LIKE $2",
        )
        .bind(&self.schema)
        .bind(prefix_like_pattern())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReconcileError::catalog("listing triggers", e))?;

        Ok(rows
            .into_iter()
            .map(|(name, table)| ExistingTrigger::new(name, table))
            .collect())
    }

    async fn list_columns(&self, table: &str) -> ReconcileResult<Vec<String>> {
        sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReconcileError::catalog(format!("reading columns of `{}`", table), e))
    }

    async fn create_trigger(
        &self,
        trigger: &TriggerDescriptor,
        columns: &[String],
    ) -> ReconcileResult<()> {
        let function = self.statements.create_function(trigger, columns);
        let create = self.statements.create_trigger(trigger);

        self.execute_atomically([function.as_str(), create.as_str()]).await
    }

    async fn drop_trigger(&self, trigger: &ExistingTrigger) -> ReconcileResult<()> {
        let drop_trigger = self.statements.drop_trigger(trigger);
        let drop_function = self.statements.drop_function(trigger);

        self.execute_atomically([drop_trigger.as_str(), drop_function.as_str()]).await
    }
}
