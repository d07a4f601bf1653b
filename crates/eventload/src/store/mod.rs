//! Persistence for accepted events
//!
//! The pipeline only sees [`RecordStore`]. Two implementations ship:
//! [`PgRecordStore`] for PostgreSQL and [`SqliteRecordStore`] for local files
//! and tests. [`connect_store`] picks one from the database URL.
//!
//! Column names are the camelCase field names, quoted, in every dialect.

mod postgres;
mod sqlite;

pub use postgres::PgRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::record::EventRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Storage for validated events (dependency injection seam)
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the target table if it does not exist; safe to call repeatedly
    async fn ensure_schema(&self) -> Result<()>;

    /// Persist one record
    async fn insert(&self, record: &EventRecord) -> Result<()>;

    /// Number of stored records
    async fn count(&self) -> Result<i64>;
}

/// Connect to the store named by `config.url`
///
/// `sqlite:` URLs open a [`SqliteRecordStore`]; everything else is treated as
/// PostgreSQL.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn RecordStore>> {
    if config.url.starts_with("sqlite:") {
        info!(table = %config.table, "Connecting to SQLite store");
        Ok(Arc::new(SqliteRecordStore::connect(config).await?))
    } else {
        info!(table = %config.table, "Connecting to PostgreSQL store");
        Ok(Arc::new(PgRecordStore::connect(config).await?))
    }
}

/// Double-quoted SQL identifier
///
/// Table names are validated as plain identifiers in config; quoting keeps
/// camelCase column names intact.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn insert_sql(table: &str, placeholders: [&str; 5]) -> String {
    format!(
        r#"INSERT INTO {} ("eventDatetime", "eventAction", "callRef", "eventValue", "eventCurrencyCode") VALUES ({})"#,
        quote_ident(table),
        placeholders.join(", ")
    )
}
