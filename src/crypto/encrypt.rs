//! The re-encryption writer: turns an edited plaintext file back into the
//! store, keeping the previous store as a backup.
//!
//! The swap never leaves a moment without a store on disk. The previous
//! store is hardlinked to `<store>.bak` first, then the freshly encrypted
//! artifact is renamed over the store path, which replaces it atomically.

use crate::constants::DEFAULT_FILE_PERMISSIONS;
use crate::crypto::tool::CryptoTool;
use crate::errors::{AppResult, ChildError};
use crate::process::{self, describe};
use crate::results::Fingerprint;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of [`StoreWriter::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The plaintext still matches its baseline; nothing was encrypted.
    Unchanged,
    /// The store was replaced.
    Committed {
        /// The backup that now holds the previous store, if one was made.
        backup: Option<PathBuf>,
    },
}

/// Writes the store from a plaintext file.
#[derive(Debug)]
pub struct StoreWriter<'a> {
    tool: &'a CryptoTool,
    store: &'a Path,
    backup: bool,
}

impl<'a> StoreWriter<'a> {
    /// Creates a writer for `store`. With `backup` set, each commit rotates
    /// the previous store into `<store>.bak`.
    pub fn new(tool: &'a CryptoTool, store: &'a Path, backup: bool) -> Self {
        Self {
            tool,
            store,
            backup,
        }
    }

    /// Path of the backup hardlink.
    pub fn backup_path(&self) -> PathBuf {
        backup_path(self.store)
    }

    /// Encrypts `plaintext` into the store unless its fingerprint still
    /// equals `baseline`.
    ///
    /// The existing store is only touched after the encrypt command has
    /// succeeded and its artifact exists.
    pub fn commit(&self, plaintext: &Path, baseline: &Fingerprint) -> AppResult<CommitOutcome> {
        let current = Fingerprint::of_file(plaintext)?;
        if current == *baseline {
            debug!("plaintext unchanged, skipping encryption");
            return Ok(CommitOutcome::Unchanged);
        }

        let artifact = self.encrypt(plaintext)?;
        let backup = self.swap(&artifact)?;

        info!(store = %self.store.display(), backup = backup.is_some(), "store updated");
        Ok(CommitOutcome::Committed { backup })
    }

    fn encrypt(&self, plaintext: &Path) -> AppResult<PathBuf> {
        let artifact = self.tool.artifact_path(plaintext);
        // A leftover artifact would make the tool prompt before overwriting.
        remove_if_present(&artifact)?;

        let args = self.tool.encrypt_args(plaintext);
        let command = describe(self.tool.program(), &args);
        let classification = process::run_to_completion(self.tool.program(), &args)?;
        if let Err(error) = classification.into_result(&command) {
            remove_if_present(&artifact)?;
            return Err(error.into());
        }

        if !artifact.is_file() {
            return Err(ChildError::MissingArtifact {
                command,
                path: artifact,
            }
            .into());
        }
        Ok(artifact)
    }

    fn swap(&self, artifact: &Path) -> AppResult<Option<PathBuf>> {
        fs::set_permissions(artifact, fs::Permissions::from_mode(DEFAULT_FILE_PERMISSIONS))?;

        let backup = if self.backup && self.store.exists() {
            let backup = self.backup_path();
            remove_if_present(&backup)?;
            fs::hard_link(self.store, &backup)?;
            debug!(backup = %backup.display(), "previous store kept");
            Some(backup)
        } else {
            None
        };

        fs::rename(artifact, self.store)?;
        Ok(backup)
    }
}

/// `<store>.bak`
pub fn backup_path(store: &Path) -> PathBuf {
    let mut path = store.as_os_str().to_owned();
    path.push(crate::constants::BACKUP_SUFFIX);
    PathBuf::from(path)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
