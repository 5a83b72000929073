//! The edit-session lock marker.
//!
//! The marker is a file containing the owner's pid, created exclusively. The
//! owner also holds an advisory `flock` on it for as long as the token
//! lives, which lets a later process tell a live session from a crashed one.

use crate::constants::DEFAULT_FILE_PERMISSIONS;
use crate::errors::LockError;
use fs2::FileExt;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ownership of the lock marker. Released on drop.
#[derive(Debug)]
pub struct LockToken {
    path: PathBuf,
    file: Option<File>,
}

/// What a process finds when it looks at the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No marker.
    Absent,
    /// A session owns the marker.
    Active {
        /// Recorded owner
        pid: Option<u32>,
    },
    /// The owner is gone without releasing the marker.
    Stale {
        /// Recorded owner
        pid: u32,
    },
}

/// Creates the marker, failing if any marker already exists.
pub fn acquire(path: &Path) -> Result<LockToken, LockError> {
    let mut options = OpenOptions::new();
    options
        .write(true)
        .create_new(true)
        .mode(DEFAULT_FILE_PERMISSIONS);

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let pid = read_pid(path);
            info!(lock = %path.display(), ?pid, "lock held by another session");
            return Err(LockError::Held {
                path: path.to_path_buf(),
                pid,
            });
        }
        Err(source) => {
            return Err(LockError::AcquisitionFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let written = file
        .try_lock_exclusive()
        .and_then(|()| writeln!(file, "{}", std::process::id()))
        .and_then(|()| file.sync_all());
    if let Err(source) = written {
        let _ = fs::remove_file(path);
        return Err(LockError::AcquisitionFailed {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(lock = %path.display(), "lock acquired");
    Ok(LockToken {
        path: path.to_path_buf(),
        file: Some(file),
    })
}

impl LockToken {
    /// The marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the marker. Calling it again, or after someone else removed
    /// the marker, is a no-op.
    pub fn release(&mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        remove_marker(&self.path)?;
        drop(file);
        debug!(lock = %self.path.display(), "lock released");
        Ok(())
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            warn!(lock = %self.path.display(), %error, "failed to remove lock");
        }
    }
}

/// Removes the marker file, ignoring its absence.
pub fn remove_marker(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// The pid recorded in the marker, if it can be read.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Classifies the marker at `path`.
///
/// A marker is stale only when nobody holds its advisory lock and the
/// recorded pid no longer exists. A marker without a readable pid counts as
/// active.
pub fn inspect(path: &Path) -> io::Result<LockState> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockState::Absent),
        Err(e) => return Err(e),
    };
    let pid = read_pid(path);

    if file.try_lock_exclusive().is_err() {
        return Ok(LockState::Active { pid });
    }
    // Dropping the probe handle releases the probe lock.
    drop(file);

    match pid {
        Some(pid) if !process_alive(pid) => Ok(LockState::Stale { pid }),
        pid => Ok(LockState::Active { pid }),
    }
}

fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
