// SQLite event store

use super::{insert_sql, quote_ident, RecordStore};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::record::EventRecord;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Event store backed by SQLite
///
/// `eventValue` is stored as text so no decimal precision is lost.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    db: SqlitePool,
    table: String,
}

impl SqliteRecordStore {
    /// Wrap an existing pool
    pub fn new(db: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    /// Open a pool from configuration, creating the database file if needed
    ///
    /// In-memory databases live in a single connection that is never
    /// recycled, so every query sees the same data.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let pool_options = if config.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let db = pool_options
            .acquire_timeout(config.connect_timeout())
            .connect_with(options)
            .await?;

        info!("Database connection pool established");
        Ok(Self::new(db, config.table.clone()))
    }

    /// Private in-memory database
    pub async fn in_memory(table: impl Into<String>) -> Result<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            table: table.into(),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "eventDatetime" DATETIME NOT NULL,
                "eventAction" VARCHAR(20) NOT NULL,
                "callRef" INTEGER NOT NULL,
                "eventValue" TEXT,
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
        let sql = insert_sql(&self.table, ["?1", "?2", "?3", "?4", "?5"]);
        sqlx::query(&sql)
            .bind(record.event_datetime)
            .bind(&record.event_action)
            .bind(record.call_ref)
            .bind(record.event_value.as_ref().map(ToString::to_string))
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
