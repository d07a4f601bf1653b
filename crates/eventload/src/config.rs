//! Configuration management

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default base directory holding intake, archive and the lock marker.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Intake directory name under the base directory.
pub const DEFAULT_INTAKE_DIR_NAME: &str = "incoming";

/// Archive directory name under the base directory.
pub const DEFAULT_ARCHIVE_DIR_NAME: &str = "archive";

/// Lock marker file name under the base directory.
pub const DEFAULT_LOCK_FILE_NAME: &str = "eventload.lock";

/// Extension of files picked up from intake (no leading dot).
pub const DEFAULT_FILE_EXTENSION: &str = "csv";

/// Field delimiter of input files.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/eventload";

/// Default target table.
pub const DEFAULT_DATABASE_TABLE: &str = "event_log";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// What to do when inserting an accepted row fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreErrorPolicy {
    /// Log the failure, count it, and continue with the next row
    #[default]
    Skip,
    /// Stop the run; the current file stays in intake
    Abort,
}

impl std::str::FromStr for StoreErrorPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "continue" => Ok(StoreErrorPolicy::Skip),
            "abort" | "stop" => Ok(StoreErrorPolicy::Abort),
            _ => Err(IngestError::config(format!(
                "Invalid store error policy: {} (expected skip or abort)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for StoreErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreErrorPolicy::Skip => write!(f, "skip"),
            StoreErrorPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Full process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub database: DatabaseConfig,
}

/// Filesystem layout and row handling for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub intake_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub lock_file: PathBuf,
    pub file_extension: String,
    pub delimiter: u8,
    pub on_store_error: StoreErrorPolicy,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl PipelineConfig {
    /// Default layout rooted at `data_dir`
    pub fn in_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            intake_dir: data_dir.join(DEFAULT_INTAKE_DIR_NAME),
            archive_dir: data_dir.join(DEFAULT_ARCHIVE_DIR_NAME),
            lock_file: data_dir.join(DEFAULT_LOCK_FILE_NAME),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            delimiter: DEFAULT_DELIMITER,
            on_store_error: StoreErrorPolicy::default(),
        }
    }

    /// Validate pipeline settings
    pub fn validate(&self) -> Result<()> {
        if self.file_extension.is_empty() {
            return Err(IngestError::config("File extension cannot be empty"));
        }

        if self.file_extension.starts_with('.') {
            return Err(IngestError::config(format!(
                "File extension must not start with a dot: {}",
                self.file_extension
            )));
        }

        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(IngestError::config(format!(
                "Unusable delimiter byte: {:?}",
                self.delimiter as char
            )));
        }

        if self.intake_dir == self.archive_dir {
            return Err(IngestError::config(format!(
                "Intake and archive directories must differ: {}",
                self.intake_dir.display()
            )));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate database settings
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(IngestError::config("Database URL cannot be empty"));
        }

        if !is_plain_identifier(&self.table) {
            return Err(IngestError::config(format!(
                "Table name must match [A-Za-z_][A-Za-z0-9_]*: {}",
                self.table
            )));
        }

        if self.max_connections == 0 {
            return Err(IngestError::config(
                "Database max_connections must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            table: DEFAULT_DATABASE_TABLE.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from environment variables only
    ///
    /// Environment variables:
    /// - `EVENTLOAD_DATA_DIR`: base directory (default `./data`)
    /// - `EVENTLOAD_INTAKE_DIR`, `EVENTLOAD_ARCHIVE_DIR`, `EVENTLOAD_LOCK_FILE`:
    ///   override single locations under the base directory
    /// - `EVENTLOAD_FILE_EXTENSION`: intake file extension (default `csv`)
    /// - `EVENTLOAD_DELIMITER`: single ASCII field delimiter (default `,`)
    /// - `EVENTLOAD_ON_STORE_ERROR`: `skip` or `abort` (default `skip`)
    /// - `DATABASE_URL`, `DATABASE_TABLE`, `DATABASE_MAX_CONNECTIONS`,
    ///   `DATABASE_CONNECT_TIMEOUT`
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("EVENTLOAD_DATA_DIR")
            .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let mut pipeline = PipelineConfig::in_data_dir(data_dir);

        if let Ok(dir) = std::env::var("EVENTLOAD_INTAKE_DIR") {
            pipeline.intake_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("EVENTLOAD_ARCHIVE_DIR") {
            pipeline.archive_dir = PathBuf::from(dir);
        }

        if let Ok(file) = std::env::var("EVENTLOAD_LOCK_FILE") {
            pipeline.lock_file = PathBuf::from(file);
        }

        if let Ok(extension) = std::env::var("EVENTLOAD_FILE_EXTENSION") {
            pipeline.file_extension = extension;
        }

        if let Ok(delimiter) = std::env::var("EVENTLOAD_DELIMITER") {
            pipeline.delimiter = parse_delimiter(&delimiter)?;
        }

        if let Ok(policy) = std::env::var("EVENTLOAD_ON_STORE_ERROR") {
            pipeline.on_store_error = policy.parse()?;
        }

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            table: std::env::var("DATABASE_TABLE")
                .unwrap_or_else(|_| DEFAULT_DATABASE_TABLE.to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { pipeline, database })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.database.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::in_data_dir(DEFAULT_DATA_DIR),
            database: DatabaseConfig::default(),
        }
    }
}

/// Accepts exactly one ASCII character
pub fn parse_delimiter(value: &str) -> Result<u8> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(IngestError::config(format!(
            "Delimiter must be a single ASCII character: {:?}",
            value
        ))),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        _ => false,
    }
}
