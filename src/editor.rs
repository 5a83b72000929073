//! Editor abstraction for opening the plaintext file of an edit session.
//!
//! This module provides an abstraction for opening a file in an external
//! editor, allowing the edit workflow to be tested with a mock editor.

use crate::constants::{EDITOR_FORBIDDEN_CHARS, SWAPFILE_EDITORS};
use crate::errors::{AppError, AppResult, EditorError};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Trait defining the interface for an editor component.
///
/// # Examples
///
/// ```
/// use mdp::editor::Editor;
/// use mdp::errors::AppResult;
/// use std::path::Path;
///
/// struct DummyEditor;
///
/// impl Editor for DummyEditor {
///     fn edit(&self, path: &Path) -> AppResult<()> {
///         println!("Would edit {}", path.display());
///         Ok(())
///     }
/// }
///
/// DummyEditor.edit(Path::new("/tmp/tmp_edit.x")).unwrap();
/// ```
pub trait Editor {
    /// Opens `path` and returns once the user has finished editing.
    ///
    /// # Errors
    ///
    /// Implementations return `AppError::Editor` when the editor cannot be
    /// run or reports failure.
    fn edit(&self, path: &Path) -> AppResult<()>;
}

/// An editor launched as a child process from a command string such as
/// `"vim"` or `"code --wait"`.
///
/// The command is split on whitespace and run without a shell. Vim-family
/// editors get `-n` so they do not write swap files of the plaintext.
///
/// # Examples
///
/// ```
/// use mdp::editor::SystemEditor;
///
/// let editor = SystemEditor::new("vim").unwrap();
/// assert_eq!(editor.program(), "vim");
/// assert_eq!(editor.args(), &["-n".to_string()]);
///
/// assert!(SystemEditor::new("vim; rm -rf ~").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SystemEditor {
    program: String,
    args: Vec<String>,
}

impl SystemEditor {
    /// Parses and validates an editor command string.
    pub fn new(command: &str) -> AppResult<Self> {
        validate_editor_command(command)?;
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::Config("editor command cannot be empty".to_string()))?;
        let mut args: Vec<String> = parts.collect();

        let base = Path::new(&program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&program);
        if SWAPFILE_EDITORS.contains(&base) && !args.iter().any(|a| a == "-n") {
            args.push("-n".to_string());
        }
        Ok(Self { program, args })
    }

    /// The executable.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments placed before the file path.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Editor for SystemEditor {
    fn edit(&self, path: &Path) -> AppResult<()> {
        debug!(editor = %self.program, "launching editor");
        let status = Command::new(&self.program).args(&self.args).arg(path).status();

        match status {
            Err(e) => Err(spawn_error(&self.program, e).into()),
            Ok(status) => match (status.code(), status.signal()) {
                (Some(0), _) => Ok(()),
                (None, Some(signal)) => Err(EditorError::Signaled {
                    command: self.program.clone(),
                    signal,
                }
                .into()),
                (code, _) => Err(EditorError::NonZeroExit {
                    command: self.program.clone(),
                    status_code: code.unwrap_or(-1),
                }
                .into()),
            },
        }
    }
}

fn spawn_error(command: &str, source: io::Error) -> EditorError {
    let command = command.to_string();
    match source.kind() {
        io::ErrorKind::NotFound => EditorError::CommandNotFound { command, source },
        io::ErrorKind::PermissionDenied => EditorError::PermissionDenied { command, source },
        _ => EditorError::ExecutionFailed { command, source },
    }
}

/// Rejects editor commands that are empty or contain shell metacharacters.
pub fn validate_editor_command(command: &str) -> AppResult<()> {
    if command.trim().is_empty() {
        return Err(AppError::Config(
            "editor command cannot be empty".to_string(),
        ));
    }
    if command.contains(EDITOR_FORBIDDEN_CHARS) {
        return Err(AppError::Config(format!(
            "editor command '{}' contains forbidden characters",
            command
        )));
    }
    Ok(())
}
