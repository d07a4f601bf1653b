//! Logging Configuration and Initialization
//!
//! Centralized logging for all eventload components. It supports:
//!
//! - Multiple output targets (console, file, both)
//! - Multiple log formats (text, JSON)
//! - Configurable log levels and per-module filter directives
//! - Daily log file rotation
//! - Environment-based configuration
//!
//! Unlike a fire-and-forget global subscriber, [`init_logging`] hands back a
//! [`Logging`] handle. The handle owns the subscriber [`Dispatch`] and the
//! background file writer guard. Callers scope the dispatch over the work they
//! run (`tracing::dispatcher::set_default`) and pass [`Logging::dispatch`] to
//! components that log under it. Dropping the handle flushes buffered file
//! output.
//!
//! # Log levels used by eventload
//!
//! - `info!`: run lifecycle (start, no files, processing file X, summaries)
//! - `debug!`: row-level rejections with every failure reason
//! - `warn!`: storage failures that were skipped
//! - `error!`: failures that end the run
//!
//! # Example
//!
//! ```no_run
//! use eventload_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! let config = LogConfig::from_env().unwrap();
//! let logging = init_logging(&config).unwrap();
//! let _default = tracing::dispatcher::set_default(&logging.dispatch());
//! info!(file = "events.csv", "Processing file");
//! ```

use crate::error::{CommonError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{Dispatch, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive,
    fmt::{format::FmtSpan, MakeWriter},
    layer::{Layered, SubscriberExt},
    EnvFilter, Layer, Registry,
};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Where formatted events go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Console,
    /// Daily rolling files under [`LogConfig::log_dir`]
    File,
    Both,
}

impl LogOutput {
    fn includes_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn includes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogOutput::Console => "console",
            LogOutput::File => "file",
            LogOutput::Both => "both",
        }
    }
}

impl FromStr for LogOutput {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            other => Err(CommonError::config(format!(
                "Unknown log output '{}' (console, file, both)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CommonError::config(format!(
                "Unknown log format '{}' (text, json)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a level name (`trace`..`error`, any case)
pub fn parse_level(s: &str) -> Result<Level> {
    Level::from_str(s).map_err(|_| CommonError::config(format!("Unknown log level '{}'", s)))
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Most verbose level let through
    pub level: Level,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Only used when output includes file
    pub log_dir: PathBuf,
    /// Rolled files are named `<prefix>.<date>`
    pub log_file_prefix: String,
    /// Extra per-target directives, e.g. `sqlx=warn,eventload=debug`
    pub filter_directives: Option<String>,
    pub include_location: bool,
    pub include_thread_ids: bool,
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "eventload".to_string(),
            filter_directives: None,
            include_location: false,
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Defaults overlaid with the environment
    ///
    /// Environment variables:
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`: file output location
    /// - `LOG_FILTER`: extra filter directives
    /// - `LOG_INCLUDE_LOCATION`, `LOG_INCLUDE_THREAD_IDS`, `LOG_INCLUDE_TARGETS`: true/false
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Overlay environment variables on `self`; set variables win
    pub fn merge_env(mut self) -> Result<Self> {
        if let Some(level) = env("LOG_LEVEL") {
            self.level = parse_level(&level)?;
        }
        if let Some(output) = env("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(format) = env("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(dir) = env("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = env("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Some(filter) = env("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }

        self.include_location = env_flag("LOG_INCLUDE_LOCATION", self.include_location);
        self.include_thread_ids = env_flag("LOG_INCLUDE_THREAD_IDS", self.include_thread_ids);
        self.include_targets = env_flag("LOG_INCLUDE_TARGETS", self.include_targets);

        Ok(self)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str, current: bool) -> bool {
    env(name).and_then(|v| v.parse().ok()).unwrap_or(current)
}

/// Fluent [`LogConfig`] construction
#[derive(Debug, Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Live logging capability returned by [`init_logging`]
///
/// Keep it alive until shutdown: the file writer guard flushes on drop.
pub struct Logging {
    dispatch: Dispatch,
    _file_guard: Option<WorkerGuard>,
}

impl Logging {
    /// Subscriber dispatch for components that run under this logger
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("file_output", &self._file_guard.is_some())
            .finish()
    }
}

/// Build the subscriber described by `config`
///
/// Nothing is installed globally.
pub fn init_logging(config: &LogConfig) -> Result<Logging> {
    let filter = build_filter(config)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.output.includes_console() {
        layers.push(fmt_layer(config, std::io::stdout, true));
    }

    let file_guard = if config.output.includes_file() {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            CommonError::logging(format!(
                "Failed to create log directory {}: {}",
                config.log_dir.display(),
                e
            ))
        })?;

        let file_appender =
            tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // No ANSI colors in files
        layers.push(fmt_layer(config, non_blocking, false));
        Some(guard)
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layers);

    Ok(Logging {
        dispatch: Dispatch::new(subscriber),
        _file_guard: file_guard,
    })
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            let directive: Directive = directive.trim().parse().map_err(|e| {
                CommonError::logging(format!("Failed to parse filter directive '{}': {}", directive, e))
            })?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(config.include_targets)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(ansi);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
