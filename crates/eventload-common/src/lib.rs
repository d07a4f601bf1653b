//! eventload Common Library
//!
//! Shared plumbing for the eventload workspace members.
//!
//! - **Error Handling**: [`CommonError`] and its result alias
//! - **Logging**: configurable `tracing` subscriber with an explicit lifecycle
//!
//! # Example
//!
//! ```no_run
//! use eventload_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> eventload_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let logging = init_logging(&config)?;
//!     let _default = tracing::dispatcher::set_default(&logging.dispatch());
//!
//!     info!("Application started");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
