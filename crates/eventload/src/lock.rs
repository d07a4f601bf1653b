//! Cross-process run lock
//!
//! Advisory mutual exclusion between invocations: a marker file exists while
//! a run is processing files. The marker is created with create-new semantics
//! so two racing processes cannot both win.
//!
//! A process that dies while holding the lock leaves the marker behind and
//! every later run reports "already running" until an operator deletes it.
//! There is no expiry. The marker records the holder's pid and start time to
//! help with that decision.

use crate::error::{IngestError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of the marker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: String,
}

/// Location of the marker file
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some run currently holds the lock
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Holder details, if the marker exists and is readable
    pub fn holder(&self) -> Option<LockInfo> {
        let contents = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Create the marker, or return `None` if it already exists
    pub fn try_acquire(&self) -> Result<Option<RunLockGuard>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                IngestError::lock(&self.path, format!("cannot create lock directory: {e}"))
            })?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(IngestError::lock(&self.path, format!("cannot create marker: {e}")));
            },
        };

        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now().to_rfc3339(),
        };

        let guard = RunLockGuard {
            path: self.path.clone(),
            released: false,
        };

        // From here on the guard removes the marker if writing fails.
        file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| IngestError::io(&self.path, e))?;

        debug!(lock = %self.path.display(), pid = info.pid, "Run lock acquired");
        Ok(Some(guard))
    }
}

/// A held run lock; the marker is removed on release or drop
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
    released: bool,
}

impl RunLockGuard {
    /// Remove the marker, reporting failures
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(lock = %self.path.display(), "Run lock marker vanished before release");
            },
            Err(e) => {
                return Err(IngestError::lock(&self.path, format!("cannot remove marker: {e}")));
            },
        }
        self.released = true;
        debug!(lock = %self.path.display(), "Run lock released");
        Ok(())
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(error = %e, "Failed to remove run lock marker");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("eventload.lock"));

        let guard = lock.try_acquire().unwrap().expect("first acquire");
        assert!(lock.is_held());
        assert!(lock.try_acquire().unwrap().is_none());

        guard.release().unwrap();
        assert!(!lock.is_held());
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_drop_releases_marker() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("eventload.lock"));
        {
            let _guard = lock.try_acquire().unwrap().unwrap();
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_marker_records_holder() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("nested/eventload.lock"));
        let _guard = lock.try_acquire().unwrap().unwrap();

        let holder = lock.holder().unwrap();
        assert_eq!(holder.pid, std::process::id());
        assert!(chrono::DateTime::parse_from_rfc3339(&holder.acquired_at).is_ok());
    }

    #[test]
    fn test_unusable_lock_location_is_a_lock_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let lock = RunLock::new(blocker.join("eventload.lock"));
        let err = lock.try_acquire().err().expect("acquire should fail");
        assert!(matches!(err, IngestError::Lock { ref path, .. } if path == lock.path()));
        assert!(!lock.is_held());
    }

    #[test]
    fn test_stale_marker_is_never_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventload.lock");
        fs::write(&path, "left behind by a crashed run").unwrap();

        let lock = RunLock::new(&path);
        assert!(lock.is_held());
        assert!(lock.holder().is_none());
        assert!(lock.try_acquire().unwrap().is_none());
        assert!(path.exists());
    }
}
