//! Recovery from sessions that ended without cleaning up.

use crate::constants::LOCK_FILE_NAME;
use crate::crypto::temp::{is_plaintext_file_name, secure_delete};
use crate::errors::AppResult;
use crate::session::lock::{self, LockState};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Plaintext files that were destroyed.
    pub removed: Vec<PathBuf>,
    /// Whether a stale lock marker was removed.
    pub stale_lock_removed: bool,
    /// Whether the sweep stood down because an edit session is running.
    pub skipped_active_session: bool,
}

/// Securely deletes leftover plaintext files in the configuration directory.
///
/// While another edit session holds the lock its plaintext file is live, so
/// nothing is touched. A lock left behind by a dead process is removed first.
pub fn sweep_stale(dir: &Path) -> AppResult<SweepReport> {
    let lock_path = dir.join(LOCK_FILE_NAME);
    let mut report = SweepReport::default();

    match lock::inspect(&lock_path)? {
        LockState::Active { pid } => {
            debug!(?pid, "edit session active, not sweeping");
            report.skipped_active_session = true;
            return Ok(report);
        }
        LockState::Stale { pid } => {
            warn!(pid, lock = %lock_path.display(), "removing stale lock");
            lock::remove_marker(&lock_path)?;
            report.stale_lock_removed = true;
        }
        LockState::Absent => {}
    }

    report.removed = sweep_plaintext_files(dir)?;
    Ok(report)
}

/// Securely deletes every `tmp_edit.*` file in `dir`, warning for each.
///
/// Only safe while no other session can be using them: after finding no
/// active lock, or while holding the lock.
pub fn sweep_plaintext_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_plaintext_file_name(&path) {
            continue;
        }
        warn!(file = %path.display(), "removing stale temporary file");
        if secure_delete(&path)? {
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sweep_removes_only_prefixed_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tmp_edit.aaaa"), "pw").unwrap();
        fs::write(dir.path().join("tmp_edit.bbbb.gpg"), "cipher").unwrap();
        fs::write(dir.path().join("passwords"), "store").unwrap();
        fs::write(dir.path().join("config"), "set timeout 5\n").unwrap();

        let report = sweep_stale(dir.path()).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert!(!report.skipped_active_session);
        assert!(dir.path().join("passwords").exists());
        assert!(dir.path().join("config").exists());
        assert!(!dir.path().join("tmp_edit.aaaa").exists());
    }

    #[test]
    fn test_sweep_stands_down_for_active_session() {
        let dir = tempdir().unwrap();
        let _token = lock::acquire(&dir.path().join(LOCK_FILE_NAME)).unwrap();
        fs::write(dir.path().join("tmp_edit.live"), "pw").unwrap();

        let report = sweep_stale(dir.path()).unwrap();

        assert!(report.skipped_active_session);
        assert!(dir.path().join("tmp_edit.live").exists());
    }

    #[test]
    fn test_sweep_recovers_from_crashed_session() {
        let dir = tempdir().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        fs::write(dir.path().join(LOCK_FILE_NAME), format!("{dead_pid}\n")).unwrap();
        fs::write(dir.path().join("tmp_edit.orphan"), "pw").unwrap();

        let report = sweep_stale(dir.path()).unwrap();

        assert!(report.stale_lock_removed);
        assert_eq!(report.removed, vec![dir.path().join("tmp_edit.orphan")]);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert_eq!(sweep_stale(dir.path()).unwrap(), SweepReport::default());
    }
}
