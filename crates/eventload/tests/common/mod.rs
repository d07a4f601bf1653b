//! Common utilities for eventload integration tests
//!
//! - [`TestLayout`]: temporary intake/archive/lock layout
//! - [`FailingStore`]: a store whose inserts fail on demand
//! - [`LogCapture`]: a dispatch that records formatted log output

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use eventload::error::{IngestError, Result};
use eventload::{EventRecord, PipelineConfig, RecordStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::Dispatch;

/// Header line shared by the fixture files
pub const HEADER: &str = "eventDatetime,eventAction,callRef,eventValue,eventCurrencyCode";

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,eventload=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Temporary data directory laid out the default way
pub struct TestLayout {
    _root: TempDir,
    pub config: PipelineConfig,
}

impl TestLayout {
    /// Creates the intake directory; archive and lock are left absent
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let config = PipelineConfig::in_data_dir(root.path());
        std::fs::create_dir_all(&config.intake_dir).expect("Failed to create intake dir");
        Self {
            _root: root,
            config,
        }
    }

    pub fn intake(&self) -> &Path {
        &self.config.intake_dir
    }

    pub fn archive(&self) -> &Path {
        &self.config.archive_dir
    }

    pub fn lock_file(&self) -> &Path {
        &self.config.lock_file
    }

    /// Write an intake file made of [`HEADER`] followed by `rows`
    pub fn write_intake(&self, name: &str, rows: &[&str]) -> PathBuf {
        let path = self.config.intake_dir.join(name);
        let mut file = std::fs::File::create(&path).expect("Failed to create intake file");
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        path
    }

    /// File names currently in `dir`, sorted
    pub fn names_in(dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Store that records inserts and fails those whose callRef is listed
#[derive(Default)]
pub struct FailingStore {
    fail_call_refs: Vec<i64>,
    fail_all: bool,
    pub inserted: Mutex<Vec<EventRecord>>,
}

impl FailingStore {
    pub fn failing_all() -> Arc<Self> {
        Arc::new(Self {
            fail_all: true,
            ..Self::default()
        })
    }

    pub fn failing_on(call_refs: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            fail_call_refs: call_refs.to_vec(),
            ..Self::default()
        })
    }

    pub fn inserted_call_refs(&self) -> Vec<i64> {
        self.inserted.lock().unwrap().iter().map(|r| r.call_ref).collect()
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, record: &EventRecord) -> Result<()> {
        if self.fail_all || self.fail_call_refs.contains(&record.call_ref) {
            return Err(IngestError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inserted.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.inserted.lock().unwrap().len() as i64)
    }
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Dispatch writing plain text at debug level into this capture
    pub fn dispatch(&self) -> Dispatch {
        let buf = self.buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(buf.clone()))
            .finish();
        Dispatch::new(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}
