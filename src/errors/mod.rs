//! Error handling utilities for mdp.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, the
//! per-concern error enums it wraps, and the convenience type alias `AppResult`.
//!
//! Recoverable outcomes (an absent store, an edit without changes) are not
//! errors and never appear here; they are ordinary return values of the
//! components that produce them.

use crate::constants::{CONFIG_ERROR_EXIT_CODE, INTERRUPT_EXIT_CODE};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents specific error cases that can occur when interacting with external editors.
///
/// # Examples
///
/// ```
/// use mdp::errors::EditorError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "command not found");
/// let error = EditorError::CommandNotFound {
///     command: "vim".to_string(),
///     source: io_error,
/// };
///
/// assert!(format!("{}", error).contains("not found"));
/// assert!(format!("{}", error).contains("vim"));
/// ```
#[derive(Debug, Error)]
pub enum EditorError {
    /// Error when the specified editor command cannot be found.
    #[error("editor '{command}' not found: {source}")]
    CommandNotFound {
        /// The editor command that was not found
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when permission is denied to execute the editor command.
    #[error("permission denied running editor '{command}': {source}")]
    PermissionDenied {
        /// The editor command that had permission denied
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor command fails to execute due to other I/O errors.
    #[error("failed to run editor '{command}': {source}")]
    ExecutionFailed {
        /// The editor command that failed to execute
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error when the editor exits with a non-zero status code.
    #[error("editor '{command}' exited with status {status_code}")]
    NonZeroExit {
        /// The editor command that exited with a non-zero status
        command: String,
        /// The exit status code
        status_code: i32,
    },

    /// The editor was terminated by a signal.
    #[error("editor '{command}' was killed by signal {signal}")]
    Signaled {
        /// The editor command
        command: String,
        /// The terminating signal number
        signal: i32,
    },
}

/// Failures of the external encryption tool's child processes.
///
/// A clean non-zero exit ("refused") and a termination by signal ("aborted")
/// are reported distinctly, and the watchdog's involvement is recorded.
///
/// # Examples
///
/// ```
/// use mdp::errors::ChildError;
///
/// let error = ChildError::Signaled {
///     command: "gpg --decrypt".to_string(),
///     signal: 2,
///     timed_out: true,
/// };
/// assert!(format!("{}", error).contains("timed out"));
///
/// let error = ChildError::NonZeroExit {
///     command: "gpg --decrypt".to_string(),
///     code: 2,
/// };
/// assert!(format!("{}", error).contains("exited with status 2"));
/// ```
#[derive(Debug, Error)]
pub enum ChildError {
    /// The child could not be started.
    #[error("unable to run '{command}': {source}")]
    Spawn {
        /// The command line that failed to start
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The child ran and exited with a non-zero status.
    #[error("'{command}' failed: exited with status {code}")]
    NonZeroExit {
        /// The command line of the child
        command: String,
        /// The exit status code
        code: i32,
    },

    /// The child was terminated by a signal.
    #[error("'{command}' {}: killed by signal {signal}", abort_reason(.timed_out))]
    Signaled {
        /// The command line of the child
        command: String,
        /// The terminating signal number
        signal: i32,
        /// Whether the watchdog sent the signal
        timed_out: bool,
    },

    /// The encrypt command succeeded but left no artifact at the expected path.
    #[error("'{command}' produced no output at {}", .path.display())]
    MissingArtifact {
        /// The command line of the child
        command: String,
        /// Where the artifact was expected
        path: PathBuf,
    },
}

fn abort_reason(timed_out: &bool) -> &'static str {
    if *timed_out {
        "timed out"
    } else {
        "interrupted"
    }
}

/// Represents errors that can occur when taking the edit-session lock.
///
/// # Examples
///
/// ```
/// use mdp::errors::LockError;
/// use std::path::PathBuf;
///
/// let error = LockError::Held {
///     path: PathBuf::from("/home/u/.mdp/lock"),
///     pid: Some(4242),
/// };
/// let message = format!("{}", error);
/// assert!(message.contains("locked"));
/// assert!(message.contains("4242"));
/// ```
#[derive(Debug, Error)]
pub enum LockError {
    /// Another session already holds the lock marker.
    #[error("locked ({}){}", .path.display(), .pid.map(|pid| format!(" by process {pid}")).unwrap_or_default())]
    Held {
        /// The lock marker path
        path: PathBuf,
        /// The pid recorded in the marker, when readable
        pid: Option<u32>,
    },

    /// Error when creating or writing the marker fails for a technical reason.
    #[error("failed to acquire lock {}: {source}", .path.display())]
    AcquisitionFailed {
        /// The lock marker path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Represents all possible errors that can occur in mdp.
///
/// Note: This type does not implement `Clone` to avoid losing error context when
/// cloning `std::io::Error` values.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use mdp::errors::AppError;
///
/// let error = AppError::Config("config:3: unknown variable 'colour'".to_string());
/// assert_eq!(format!("{}", error), "config:3: unknown variable 'colour'");
/// assert_eq!(error.exit_code(), 100);
/// ```
///
/// Converting from an IO error:
/// ```
/// use mdp::errors::AppError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "file not found");
/// let app_error: AppError = io_error.into();
///
/// match app_error {
///     AppError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
///     _ => panic!("Expected Io variant"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("{0}")]
    Config(String),

    /// Invalid combination of command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read-only command found nothing to search.
    #[error("no passwords")]
    NoPasswords,

    /// A decrypted line was not valid UTF-8. Only the line number is kept.
    #[error("unable to decode line {line} of the decrypted store")]
    Decode {
        /// 1-based line number
        line: usize,
    },

    /// A keyword could not be compiled as a regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending keyword
        pattern: String,
        /// The regex compilation error
        #[source]
        source: regex::Error,
    },

    /// The encryption tool is missing or has no usable key.
    #[error("{0}")]
    Tool(String),

    /// Failures of the encrypt or decrypt child processes.
    #[error(transparent)]
    Child(#[from] ChildError),

    /// Errors when interacting with the text editor.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Errors related to the edit-session lock.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The terminal was resized while the viewer was active.
    #[error("terminal resize")]
    TerminalResized,

    /// Ctrl-C was pressed while the viewer owned the terminal.
    #[error("interrupted")]
    Interrupted,

    /// Invalid password generation parameters.
    #[error("{0}")]
    Generate(String),
}

impl AppError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => CONFIG_ERROR_EXIT_CODE,
            AppError::Interrupted => INTERRUPT_EXIT_CODE,
            _ => 1,
        }
    }
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
///
/// # Examples
///
/// ```
/// use mdp::errors::{AppResult, AppError};
///
/// fn might_fail(found: usize) -> AppResult<usize> {
///     if found == 0 {
///         return Err(AppError::NoPasswords);
///     }
///     Ok(found)
/// }
/// assert!(might_fail(0).is_err());
/// ```
pub type AppResult<T> = Result<T, AppError>;
