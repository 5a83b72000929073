//! The external encryption tool and the arguments it is invoked with.

use crate::config::Config;
use crate::constants::{ENCRYPTED_SUFFIX, SECRET_KEY_MARKER};
use crate::errors::{AppError, AppResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

/// A gpg-compatible command-line tool.
#[derive(Debug, Clone)]
pub struct CryptoTool {
    program: PathBuf,
    key_id: Option<String>,
    timeout: Duration,
}

impl CryptoTool {
    /// Creates a tool description.
    pub fn new(program: impl Into<PathBuf>, key_id: Option<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            key_id,
            timeout,
        }
    }

    /// Builds the tool from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gpg_path.clone(),
            config.gpg_key_id.clone(),
            config.gpg_timeout,
        )
    }

    /// Path of the tool's executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// How long a decryption may run before the watchdog interrupts it.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arguments that decrypt `store` to standard output.
    pub fn decrypt_args(&self, store: &Path) -> Vec<OsString> {
        vec!["-q".into(), "--decrypt".into(), store.as_os_str().to_owned()]
    }

    /// Arguments that encrypt `plaintext` to [`Self::artifact_path`].
    pub fn encrypt_args(&self, plaintext: &Path) -> Vec<OsString> {
        let mut args = Vec::with_capacity(4);
        if let Some(key_id) = &self.key_id {
            args.push("-r".into());
            args.push(key_id.into());
        }
        args.push("-e".into());
        args.push(plaintext.as_os_str().to_owned());
        args
    }

    /// Where the tool writes the encrypted form of `plaintext`.
    pub fn artifact_path(&self, plaintext: &Path) -> PathBuf {
        let mut path = plaintext.as_os_str().to_owned();
        path.push(ENCRYPTED_SUFFIX);
        PathBuf::from(path)
    }

    /// Verifies the tool runs and has at least one secret key.
    pub fn check(&self) -> AppResult<()> {
        let version = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match version {
            Ok(status) if status.success() => {}
            _ => {
                return Err(AppError::Tool(format!(
                    "unable to run {} (check gpg_path)",
                    self.program.display()
                )))
            }
        }

        let keys = Command::new(&self.program)
            .arg("--list-secret-keys")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                AppError::Tool(format!("unable to run {}: {}", self.program.display(), e))
            })?;
        let has_key = String::from_utf8_lossy(&keys.stdout)
            .lines()
            .any(|line| line.starts_with(SECRET_KEY_MARKER));
        if !keys.status.success() || !has_key {
            return Err(AppError::Tool("no gpg key found".to_string()));
        }

        debug!(program = %self.program.display(), "encryption tool available");
        Ok(())
    }
}
