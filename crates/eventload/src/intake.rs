//! Intake discovery and archiving

use crate::error::{IngestError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Regular files in `intake_dir` whose extension is exactly `extension`
///
/// A missing directory means there is nothing to do, not an error. Results are
/// sorted by file name.
pub fn discover_files(intake_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(intake_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(intake = %intake_dir.display(), "Intake directory does not exist");
            return Ok(Vec::new());
        },
        Err(e) => return Err(IngestError::io(intake_dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::io(intake_dir, e))?;
        let file_type = entry.file_type().map_err(|e| IngestError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Create the archive directory if needed
pub fn ensure_archive_dir(archive_dir: &Path) -> Result<()> {
    fs::create_dir_all(archive_dir).map_err(|e| IngestError::io(archive_dir, e))
}

/// Move `file` into `archive_dir` under its original name
///
/// An existing archive entry with the same name is replaced. Moves across
/// filesystems fall back to copy then remove.
pub fn archive_file(file: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let file_name = file
        .file_name()
        .ok_or_else(|| IngestError::config(format!("Not a file path: {}", file.display())))?;
    let destination = archive_dir.join(file_name);

    match fs::rename(file, &destination) {
        Ok(()) => {},
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            fs::copy(file, &destination).map_err(|e| IngestError::io(&destination, e))?;
            fs::remove_file(file).map_err(|e| IngestError::io(file, e))?;
        },
        Err(e) => return Err(IngestError::io(file, e)),
    }

    Ok(destination)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_intake_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = discover_files(&dir.path().join("nope"), "csv").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_only_matching_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", "c.txt", "d.CSV", "csv"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let files = discover_files(dir.path(), "csv").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_archive_moves_and_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let intake = dir.path().join("incoming");
        let archive = dir.path().join("archive");
        fs::create_dir_all(&intake).unwrap();
        let file = intake.join("events.csv");
        fs::write(&file, "header\n").unwrap();

        ensure_archive_dir(&archive).unwrap();
        let moved = archive_file(&file, &archive).unwrap();

        assert_eq!(moved, archive.join("events.csv"));
        assert!(!file.exists());
        assert_eq!(fs::read_to_string(moved).unwrap(), "header\n");
    }

    #[test]
    fn test_archive_replaces_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        ensure_archive_dir(&archive).unwrap();
        fs::write(archive.join("events.csv"), "old").unwrap();
        let file = dir.path().join("events.csv");
        fs::write(&file, "new").unwrap();

        archive_file(&file, &archive).unwrap();
        assert_eq!(fs::read_to_string(archive.join("events.csv")).unwrap(), "new");
    }
}
