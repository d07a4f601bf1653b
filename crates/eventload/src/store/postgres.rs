// PostgreSQL event store

use super::{insert_sql, quote_ident, RecordStore};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::record::EventRecord;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Event store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    db: PgPool,
    table: String,
}

impl PgRecordStore {
    /// Wrap an existing pool
    pub fn new(db: PgPool, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");
        Ok(Self::new(db, config.table.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "eventDatetime" TIMESTAMP NOT NULL,
                "eventAction" VARCHAR(20) NOT NULL,
                "callRef" BIGINT NOT NULL,
                "eventValue" NUMERIC,
                "eventCurrencyCode" CHAR(3)
            )
            "#,
            quote_ident(&self.table)
        );

        sqlx::query(&ddl).execute(&self.db).await?;
        info!(table = %self.table, "Schema ready");
        Ok(())
    }

    async fn insert(&self, record: &EventRecord) -> Result<()> {
        let sql = insert_sql(&self.table, ["$1", "$2", "$3", "$4", "$5"]);
        sqlx::query(&sql)
            .bind(record.event_datetime)
            .bind(&record.event_action)
            .bind(record.call_ref)
            .bind(record.event_value.as_ref())
            .bind(record.event_currency_code.as_deref())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.db).await?;
        Ok(count)
    }
}
