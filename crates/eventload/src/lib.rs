//! eventload
//!
//! Batch loader for delimited event-log files.
//!
//! # Overview
//!
//! One invocation is one run:
//!
//! - **Lock**: a marker file keeps concurrent runs out ([`lock`])
//! - **Discover**: files with the configured extension in the intake directory ([`intake`])
//! - **Parse**: header-keyed rows from each file ([`parser`])
//! - **Validate**: per-field rules and conditional currency checks ([`validation`])
//! - **Store**: accepted rows go to PostgreSQL or SQLite ([`store`])
//! - **Archive**: processed files move to the archive directory
//!
//! [`pipeline::Pipeline`] ties these together.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod intake;
pub mod lock;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig, PipelineConfig, StoreErrorPolicy};
pub use error::{IngestError, Result};
pub use pipeline::{Pipeline, RunOutcome, RunSummary};
pub use record::{EventRecord, RawRow};
pub use store::{connect_store, RecordStore};
pub use validation::{EventField, RowValidator};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// eventload - load event-log files into a database
#[derive(Parser, Debug)]
#[command(name = "eventload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// The subcommand, with `run` filled in when none was given
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load every intake file, then archive it
    Run(RunArgs),

    /// Parse and validate one file without storing or moving it
    Check {
        /// File to check
        file: PathBuf,

        /// Field delimiter (defaults to the configured one)
        #[arg(short, long)]
        delimiter: Option<String>,
    },

    /// Create the target table if it does not exist
    InitSchema {
        /// Database URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

/// Per-run overrides of the environment configuration
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory scanned for input files
    #[arg(long)]
    pub intake_dir: Option<PathBuf>,

    /// Directory processed files are moved to
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Run lock marker file
    #[arg(long)]
    pub lock_file: Option<PathBuf>,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// What to do when an insert fails (skip or abort)
    #[arg(long)]
    pub on_store_error: Option<StoreErrorPolicy>,
}

impl RunArgs {
    /// Apply the overrides and re-validate
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(dir) = &self.intake_dir {
            config.pipeline.intake_dir = dir.clone();
        }
        if let Some(dir) = &self.archive_dir {
            config.pipeline.archive_dir = dir.clone();
        }
        if let Some(file) = &self.lock_file {
            config.pipeline.lock_file = file.clone();
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(policy) = self.on_store_error {
            config.pipeline.on_store_error = policy;
        }
        config.validate()
    }
}
