//! MySQL trigger backend
//!
//! Triggers carry their body inline and call the `http_post` UDF with the
//! row image rendered by `JSON_OBJECT`. Every value is cast to text first so
//! DECIMAL and BIGINT columns keep their exact digits.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use super::backend::{CalloutTarget, ExistingTrigger, TriggerBackend};
use super::errors::{IdentifierKind, ReconcileError, ReconcileResult};
use super::identifier::validate_identifier;
use super::naming::{prefix_like_pattern, TriggerDescriptor};
use crate::config::DatabaseConfig;

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Builds the DDL text for one database
#[derive(Debug, Clone)]
pub struct MySqlStatements {
    database: String,
    callout: CalloutTarget,
}

impl MySqlStatements {
    pub fn new(database: impl Into<String>, callout: CalloutTarget) -> ReconcileResult<Self> {
        let database = database.into();
        validate_identifier(IdentifierKind::Database, &database)?;
        Ok(Self { database, callout })
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", quote_identifier(&self.database), quote_identifier(name))
    }

    pub fn row_object(&self, trigger: &TriggerDescriptor, columns: &[String]) -> String {
        let image = trigger.operation.row_image();
        let pairs: Vec<String> = columns
            .iter()
            .map(|column| {
                format!(
                    "{}, CAST({}.{} AS CHAR)",
                    quote_literal(column),
                    image,
                    quote_identifier(column)
                )
            })
            .collect();
        format!("JSON_OBJECT({})", pairs.join(", "))
    }

    pub fn create_trigger(&self, trigger: &TriggerDescriptor, columns: &[String]) -> String {
        let url = self.callout.url_for(&trigger.table, trigger.operation);
        format!(
            "CREATE TRIGGER {name} AFTER {operation} ON {table}\n\
             FOR EACH ROW\n\
             BEGIN\n    \
                 SET @realtimer_response = http_post({url}, 'application/json', {body});\n\
             END",
            name = self.qualified(&trigger.canonical_name),
            operation = trigger.operation.as_sql(),
            table = self.qualified(&trigger.table),
            url = quote_literal(&url),
            body = self.row_object(trigger, columns),
        )
    }

    pub fn drop_trigger(&self, trigger: &ExistingTrigger) -> String {
        format!("DROP TRIGGER IF EXISTS {}", self.qualified(&trigger.name))
    }
}

pub struct MySqlBackend {
    pool: MySqlPool,
    database: String,
    statements: MySqlStatements,
}

impl MySqlBackend {
    pub async fn connect(config: &DatabaseConfig, callout: CalloutTarget) -> ReconcileResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.mysql_connect_options())
            .await
            .map_err(|e| ReconcileError::catalog("connecting to mysql", e))?;

        tracing::info!(host = %config.host, database = %config.name, "connected to mysql");

        Self::from_pool(pool, config.name.clone(), callout)
    }

    /// Wrap an existing pool; triggers are managed in `database`
    pub fn from_pool(
        pool: MySqlPool,
        database: impl Into<String>,
        callout: CalloutTarget,
    ) -> ReconcileResult<Self> {
        let database = database.into();
        let statements = MySqlStatements::new(database.clone(), callout)?;
        Ok(Self {
            pool,
            database,
            statements,
        })
    }
}

#[async_trait]
impl TriggerBackend for MySqlBackend {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn verify_callout(&self) -> ReconcileResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mysql.func WHERE name = 'http_post'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ReconcileError::catalog("checking for the http_post function", e))?;

        if count == 0 {
            return Err(ReconcileError::catalog(
                "checking for the http_post function",
                "user-defined function `http_post` is not installed",
            ));
        }
        Ok(())
    }

    async fn list_existing_triggers(&self) -> ReconcileResult<Vec<ExistingTrigger>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT CAST(TRIGGER_NAME AS CHAR), CAST(EVENT_OBJECT_TABLE AS CHAR) \
             FROM information_schema.TRIGGERS \
             WHERE TRIGGER_SCHEMA = ? AND TRIGGER_NAME LIKE ?",
        )
        .bind(&self.database)
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
            "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(&self.database)
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
        let create = self.statements.create_trigger(trigger, columns);
        sqlx::raw_sql(&create)
            .execute(&self.pool)
            .await
            .map_err(ReconcileError::statement)?;
        Ok(())
    }

    async fn drop_trigger(&self, trigger: &ExistingTrigger) -> ReconcileResult<()> {
        let drop = self.statements.drop_trigger(trigger);
        sqlx::raw_sql(&drop)
            .execute(&self.pool)
            .await
            .map_err(ReconcileError::statement)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::event::Operation;

    fn statements() -> MySqlStatements {
        MySqlStatements::new("shop", CalloutTarget::new("http://relay:8080").unwrap()).unwrap()
    }

    #[test]
    fn test_create_trigger_text() {
        let trigger = TriggerDescriptor::new("orders", Operation::Update);
        let columns = vec!["id".to_string(), "total".to_string()];

        let sql = statements().create_trigger(&trigger, &columns);

        assert!(sql.starts_with(
            "CREATE TRIGGER `shop`.`realtimer_trigger_update_orders` AFTER UPDATE ON `shop`.`orders`"
        ));
        assert!(sql.contains(
            "http_post('http://relay:8080/api/db?table=orders&event=UPDATE', 'application/json', \
             JSON_OBJECT('id', CAST(NEW.`id` AS CHAR), 'total', CAST(NEW.`total` AS CHAR)))"
        ));
        assert!(sql.ends_with("END"));
    }

    #[test]
    fn test_delete_reads_old_row() {
        let trigger = TriggerDescriptor::new("orders", Operation::Delete);
        let body = statements().row_object(&trigger, &["id".to_string()]);
        assert_eq!(body, "JSON_OBJECT('id', CAST(OLD.`id` AS CHAR))");
    }

    #[test]
    fn test_every_column_is_sent_as_text() {
        let trigger = TriggerDescriptor::new("invoices", Operation::Insert);
        let columns = vec!["total".to_string(), "big".to_string(), "note".to_string()];

        let body = statements().row_object(&trigger, &columns);

        assert_eq!(body.matches("CAST(NEW.").count(), columns.len());
        assert!(body.contains("'total', CAST(NEW.`total` AS CHAR)"));
        assert!(body.contains("'big', CAST(NEW.`big` AS CHAR)"));
    }

    #[test]
    fn test_drop_trigger_text() {
        let trigger = ExistingTrigger::new("realtimer_trigger_insert_orders", "orders");
        assert_eq!(
            statements().drop_trigger(&trigger),
            "DROP TRIGGER IF EXISTS `shop`.`realtimer_trigger_insert_orders`"
        );
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("a`b"), "`a``b`");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_rejects_unsafe_database_name() {
        let callout = CalloutTarget::new("http://relay:8080").unwrap();
        assert!(MySqlStatements::new("shop`; drop", callout).is_err());
    }
}
