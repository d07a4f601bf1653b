//! Batch run orchestration
//!
//! One run walks these states:
//!
//! ```text
//! Idle -> LockCheck -> (AlreadyRunning | Discover) -> (NoWork | ProcessLoop) -> Done
//! ```
//!
//! The lock is only taken once there is work. After that it is released on
//! every path out of the process loop, including errors. A file is archived
//! only after all of its rows were handled; a file whose processing fails
//! stays in intake. A file without a usable header is skipped with a warning
//! and left in intake so the files after it still load.

use crate::config::{PipelineConfig, StoreErrorPolicy};
use crate::error::{IngestError, Result};
use crate::intake::{archive_file, discover_files, ensure_archive_dir};
use crate::lock::RunLock;
use crate::parser::{EventFileReader, MalformedReason, ParsedRow};
use crate::record::{EventRecord, RawRow};
use crate::store::RecordStore;
use crate::validation::RowValidator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Files were processed
    Completed(RunSummary),
    /// Intake was empty
    NoWork,
    /// Another run holds the lock
    AlreadyRunning,
}

/// Row counts for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub rows: u64,
    pub inserted: u64,
    pub malformed: u64,
    pub rejected: u64,
    pub failed_inserts: u64,
}

/// Totals for a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Archive paths of processed files, in processing order
    pub files: Vec<PathBuf>,
    /// Intake files left in place because their header is unusable
    pub skipped: Vec<PathBuf>,
    pub totals: FileSummary,
}

impl FileSummary {
    fn add(&mut self, other: &FileSummary) {
        self.rows += other.rows;
        self.inserted += other.inserted;
        self.malformed += other.malformed;
        self.rejected += other.rejected;
        self.failed_inserts += other.failed_inserts;
    }
}

/// What happened to one data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(EventRecord),
    Malformed { line: u64, reason: MalformedReason },
    Rejected { line: u64, reasons: Vec<String> },
}

/// Classify one parsed line: malformed, rejected, or an insert-ready record
pub fn classify_row(validator: &RowValidator, parsed: ParsedRow) -> RowOutcome {
    match parsed {
        ParsedRow::Malformed { line, reason } => RowOutcome::Malformed { line, reason },
        ParsedRow::Row(row) => classify_valid_row(validator, &row),
    }
}

fn classify_valid_row(validator: &RowValidator, row: &RawRow) -> RowOutcome {
    let report = validator.validate(row);
    if !report.is_valid() {
        return RowOutcome::Rejected {
            line: row.line(),
            reasons: report.failures.iter().map(ToString::to_string).collect(),
        };
    }

    match EventRecord::from_row(row) {
        Ok(record) => RowOutcome::Accepted(record),
        Err(e) => RowOutcome::Rejected {
            line: row.line(),
            reasons: vec![e.to_string()],
        },
    }
}

/// Dry-run report for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub summary: FileSummary,
    /// `(line, reason)` for every skipped row
    pub problems: Vec<(u64, String)>,
}

/// Parse and validate `path` without storing, locking or archiving anything
pub fn check_file(path: &Path, delimiter: u8) -> Result<CheckReport> {
    let validator = RowValidator::new();
    let mut report = CheckReport::default();

    for parsed in EventFileReader::open(path, delimiter)? {
        report.summary.rows += 1;
        match classify_row(&validator, parsed?) {
            RowOutcome::Accepted(_) => report.summary.inserted += 1,
            RowOutcome::Malformed { line, reason } => {
                report.summary.malformed += 1;
                report.problems.push((line, reason.to_string()));
            },
            RowOutcome::Rejected { line, reasons } => {
                report.summary.rejected += 1;
                report.problems.push((line, reasons.join("; ")));
            },
        }
    }

    Ok(report)
}

/// Single-pass loader: intake files -> validated rows -> store -> archive
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn RecordStore>,
    validator: RowValidator,
    dispatch: Option<Dispatch>,
}

impl Pipeline {
    /// Without [`Pipeline::with_dispatch`], each run logs through the
    /// subscriber that is current where `run` is awaited.
    pub fn new(config: PipelineConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            store,
            validator: RowValidator::new(),
            dispatch: None,
        }
    }

    /// Log through `dispatch` for every run
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunOutcome> {
        match &self.dispatch {
            Some(dispatch) => self.run_inner().with_subscriber(dispatch.clone()).await,
            None => self.run_inner().await,
        }
    }

    async fn run_inner(&self) -> Result<RunOutcome> {
        info!(
            intake = %self.config.intake_dir.display(),
            archive = %self.config.archive_dir.display(),
            "Starting event load run"
        );

        let lock = RunLock::new(&self.config.lock_file);
        if lock.is_held() {
            info!(lock = %lock.path().display(), "Another run holds the lock, exiting");
            return Ok(RunOutcome::AlreadyRunning);
        }

        let files = discover_files(&self.config.intake_dir, &self.config.file_extension)?;
        if files.is_empty() {
            info!(extension = %self.config.file_extension, "No files to process");
            return Ok(RunOutcome::NoWork);
        }

        let Some(guard) = lock.try_acquire()? else {
            info!(lock = %lock.path().display(), "Lost the race for the run lock, exiting");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let processed = self.process_files(&files).await;
        let released = guard.release();

        let summary = match processed {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(release_error) = released {
                    warn!(error = %release_error, "Failed to release run lock after abort");
                }
                error!(error = %e, "Run aborted");
                return Err(e);
            },
        };
        released?;

        info!(
            files = summary.files.len(),
            skipped = summary.skipped.len(),
            rows = summary.totals.rows,
            inserted = summary.totals.inserted,
            malformed = summary.totals.malformed,
            rejected = summary.totals.rejected,
            failed_inserts = summary.totals.failed_inserts,
            "Run complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    async fn process_files(&self, files: &[PathBuf]) -> Result<RunSummary> {
        ensure_archive_dir(&self.config.archive_dir)?;

        let mut summary = RunSummary::default();
        for file in files {
            info!(file = %file.display(), "Processing file");

            let file_summary = match self.process_file(file).await {
                Ok(file_summary) => file_summary,
                Err(e @ IngestError::InvalidHeader { .. }) => {
                    warn!(file = %file.display(), error = %e, "Skipping file, left in intake");
                    summary.skipped.push(file.clone());
                    continue;
                },
                Err(e) => return Err(e),
            };
            let archived = archive_file(file, &self.config.archive_dir)?;

            info!(
                file = %file.display(),
                archived = %archived.display(),
                rows = file_summary.rows,
                inserted = file_summary.inserted,
                malformed = file_summary.malformed,
                rejected = file_summary.rejected,
                failed_inserts = file_summary.failed_inserts,
                "File archived"
            );

            summary.totals.add(&file_summary);
            summary.files.push(archived);
        }

        Ok(summary)
    }

    async fn process_file(&self, file: &Path) -> Result<FileSummary> {
        let mut summary = FileSummary::default();

        for parsed in EventFileReader::open(file, self.config.delimiter)? {
            summary.rows += 1;

            match classify_row(&self.validator, parsed?) {
                RowOutcome::Malformed { line, reason } => {
                    summary.malformed += 1;
                    debug!(file = %file.display(), line, %reason, "Skipping malformed row");
                },
                RowOutcome::Rejected { line, reasons } => {
                    summary.rejected += 1;
                    debug!(
                        file = %file.display(),
                        line,
                        reasons = %reasons.join("; "),
                        "Skipping invalid row"
                    );
                },
                RowOutcome::Accepted(record) => match self.store.insert(&record).await {
                    Ok(()) => summary.inserted += 1,
                    Err(e) => match self.config.on_store_error {
                        StoreErrorPolicy::Skip => {
                            summary.failed_inserts += 1;
                            warn!(
                                file = %file.display(),
                                call_ref = record.call_ref,
                                error = %e,
                                "Insert failed, skipping row"
                            );
                        },
                        StoreErrorPolicy::Abort => {
                            error!(
                                file = %file.display(),
                                call_ref = record.call_ref,
                                error = %e,
                                "Insert failed, aborting run"
                            );
                            return Err(e);
                        },
                    },
                },
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_rejects_typed_conversion_failures() {
        let row = RawRow::new(
            4,
            [
                ("eventDatetime", "2023-02-30 10:00:00"),
                ("eventAction", "login"),
                ("callRef", "1"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );

        let outcome = classify_row(&RowValidator::new(), ParsedRow::Row(row));
        let RowOutcome::Rejected { line, reasons } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(line, 4);
        assert!(reasons[0].contains("calendar"));
    }

    #[test]
    fn test_check_file_counts_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "eventDatetime,eventAction,callRef,eventValue,eventCurrencyCode").unwrap();
        writeln!(file, "2023-01-01 10:00:00,login,1001,,").unwrap();
        writeln!(file, "2023-01-01 10:05:00,purchase,1002,9.99,USD").unwrap();
        writeln!(file, "bad-date,login,1003,,").unwrap();
        writeln!(file, "2023-01-01 10:05:00,purchase,1004,9.99").unwrap();
        drop(file);

        let report = check_file(&path, b',').unwrap();
        assert_eq!(
            report.summary,
            FileSummary {
                rows: 4,
                inserted: 2,
                malformed: 1,
                rejected: 1,
                failed_inserts: 0,
            }
        );
        assert_eq!(report.problems.len(), 2);
        assert_eq!(report.problems[0].0, 4);
        assert!(report.problems[0].1.contains("eventDatetime"));
        assert_eq!(report.problems[1].0, 5);
        assert!(path.exists());
    }
}
