//! Error types for event loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for event loading operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that end a command or a run
///
/// Row-level problems (malformed or invalid rows) are not errors: they are
/// logged and counted by the pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file cannot be read as an event file at all; the pipeline skips it
    #[error("Unusable header in '{}': {reason}", .path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown event field: '{0}'")]
    UnknownField(String),

    #[error("Run lock error on '{}': {message}", .path.display())]
    Lock { path: PathBuf, message: String },

    #[error("Failed to serialize lock marker: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IngestError {
    /// Create an IO error bound to the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a CSV read error bound to the file it happened in
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Create a header rejection for `path`
    pub fn invalid_header(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a lock error
    pub fn lock(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Lock {
            path: path.into(),
            message: msg.into(),
        }
    }
}
