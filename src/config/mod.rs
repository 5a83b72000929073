//! Configuration management for mdp.
//!
//! Configuration is resolved once at startup into a [`Config`] value that is
//! passed to every component. Nothing else in the crate reads the
//! environment.
//!
//! # Sources, in order of precedence
//!
//! 1. Command-line overrides (`-c <config>`, `-k <key_id>`)
//! 2. The config file (`<dir>/config`), lines of `set <name> <value>`
//! 3. `EDITOR` for the editor
//! 4. Built-in defaults
//!
//! # Environment Variables
//!
//! - `MDP_DIR`: configuration directory (defaults to `$HOME/.mdp`)
//! - `EDITOR`: editor used by `-e` unless the config file sets one
//! - `HOME`: used for the default directory
//!
//! # Config file
//!
//! ```text
//! # comments and blank lines are ignored
//! set gpg_path /usr/local/bin/gpg
//! set gpg_key_id 0xDEADBEEF
//! set gpg_timeout 10
//! set timeout 20
//! set editor "code --wait"
//! set backup on
//! set password_count 4
//! set character_count 16
//! ```

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CHARACTER_COUNT,
    DEFAULT_DIR_PERMISSIONS, DEFAULT_EDITOR_COMMAND, DEFAULT_GPG_PATH, DEFAULT_GPG_TIMEOUT_SECS,
    DEFAULT_PASSWORD_COUNT, DEFAULT_VIEWER_TIMEOUT_SECS, ENV_VAR_EDITOR, ENV_VAR_HOME,
    ENV_VAR_MDP_DIR, FORBIDDEN_WRITE_BITS, LOCK_FILE_NAME, MAX_PASSWORD_LENGTH, MAX_TIMEOUT_SECS,
    REDACTED_PLACEHOLDER, STORE_FILE_NAME,
};
use crate::crypto::encrypt;
use crate::editor::validate_editor_command;
use crate::errors::{AppError, AppResult};
use nix::unistd::getuid;
use std::env;
use std::fmt;
use std::fs::{self, DirBuilder, Metadata};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration for mdp.
///
/// # Examples
///
/// ```
/// use mdp::Config;
/// use std::path::PathBuf;
///
/// let config = Config::with_dir(PathBuf::from("/home/u/.mdp"));
/// assert_eq!(config.store_path, PathBuf::from("/home/u/.mdp/passwords"));
/// assert!(config.backup);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Config {
    /// Configuration directory holding the store, lock and temporary files.
    pub dir: PathBuf,
    /// Config file that was read (it may not exist).
    pub config_path: PathBuf,
    /// Encrypted store.
    pub store_path: PathBuf,
    /// Edit-session lock marker.
    pub lock_path: PathBuf,
    /// Encryption tool executable.
    pub gpg_path: PathBuf,
    /// Recipient for re-encryption; the tool's default when unset.
    pub gpg_key_id: Option<String>,
    /// How long decryption may run before it is interrupted.
    pub gpg_timeout: Duration,
    /// How long the viewer waits for a key before exiting.
    pub viewer_timeout: Duration,
    /// Editor command for `-e`.
    pub editor: String,
    /// Whether re-encryption keeps the previous store as `<store>.bak`.
    pub backup: bool,
    /// Number of passwords `-g` prints.
    pub password_count: u32,
    /// Length of passwords `-g` prints.
    pub character_count: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dir", &self.dir)
            .field("gpg_path", &self.gpg_path)
            .field(
                "gpg_key_id",
                &self.gpg_key_id.as_ref().map(|_| REDACTED_PLACEHOLDER),
            )
            .field("gpg_timeout", &self.gpg_timeout)
            .field("viewer_timeout", &self.viewer_timeout)
            .field("editor", &REDACTED_PLACEHOLDER)
            .field("backup", &self.backup)
            .finish_non_exhaustive()
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Alternative config file (`-c`).
    pub config_path: Option<PathBuf>,
    /// Recipient key id (`-k`).
    pub key_id: Option<String>,
}

/// Values set by a config file. `None` means "not mentioned".
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub gpg_path: Option<String>,
    pub gpg_key_id: Option<String>,
    pub gpg_timeout: Option<u64>,
    pub timeout: Option<u64>,
    pub editor: Option<String>,
    pub backup: Option<bool>,
    pub password_count: Option<u32>,
    pub character_count: Option<u32>,
}

impl Config {
    /// Defaults for a configuration directory.
    pub fn with_dir(dir: PathBuf) -> Self {
        Config {
            config_path: dir.join(CONFIG_FILE_NAME),
            store_path: dir.join(STORE_FILE_NAME),
            lock_path: dir.join(LOCK_FILE_NAME),
            dir,
            gpg_path: PathBuf::from(DEFAULT_GPG_PATH),
            gpg_key_id: None,
            gpg_timeout: Duration::from_secs(DEFAULT_GPG_TIMEOUT_SECS),
            viewer_timeout: Duration::from_secs(DEFAULT_VIEWER_TIMEOUT_SECS),
            editor: DEFAULT_EDITOR_COMMAND.to_string(),
            backup: true,
            password_count: DEFAULT_PASSWORD_COUNT,
            character_count: DEFAULT_CHARACTER_COUNT,
        }
    }

    /// Loads configuration from the environment and the config file.
    ///
    /// Creates the configuration directory (mode 0700) if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory cannot be resolved, the
    /// directory or any file in it has unsafe ownership or permissions, or
    /// the config file is malformed.
    pub fn load(overrides: &Overrides) -> AppResult<Self> {
        let dir = resolve_dir(
            env::var(ENV_VAR_MDP_DIR).ok(),
            env::var(ENV_VAR_HOME).ok(),
        )?;
        Self::load_from(dir, env::var(ENV_VAR_EDITOR).ok(), overrides)
    }

    /// Loads configuration for an explicit directory and editor variable.
    pub fn load_from(
        dir: PathBuf,
        env_editor: Option<String>,
        overrides: &Overrides,
    ) -> AppResult<Self> {
        ensure_private_dir(&dir)?;
        let mut config = Config::with_dir(dir);

        if let Some(editor) = env_editor.filter(|e| !e.trim().is_empty()) {
            config.editor = editor;
        }

        let explicit = overrides.config_path.is_some();
        if let Some(path) = &overrides.config_path {
            config.config_path = expand_path(&path.to_string_lossy())?;
        }
        match check_private_file(&config.config_path) {
            Ok(()) => {
                let text = fs::read_to_string(&config.config_path)?;
                let settings = parse_settings(&text)?;
                config.apply(settings)?;
                debug!(path = %config.config_path.display(), "config file read");
            }
            Err(FileCheck::Missing) if !explicit => {}
            Err(FileCheck::Missing) => {
                return Err(AppError::Config(format!(
                    "{}: no such file",
                    config.config_path.display()
                )))
            }
            Err(FileCheck::Invalid(error)) => return Err(error),
        }

        for path in [config.store_path.clone(), config.backup_path()] {
            match check_private_file(&path) {
                Ok(()) | Err(FileCheck::Missing) => {}
                Err(FileCheck::Invalid(error)) => return Err(error),
            }
        }

        if let Some(key_id) = &overrides.key_id {
            config.gpg_key_id = Some(key_id.clone());
        }

        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, settings: Settings) -> AppResult<()> {
        if let Some(path) = settings.gpg_path {
            self.gpg_path = expand_path(&path)?;
        }
        if let Some(key_id) = settings.gpg_key_id {
            self.gpg_key_id = Some(key_id);
        }
        if let Some(secs) = settings.gpg_timeout {
            self.gpg_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = settings.timeout {
            self.viewer_timeout = Duration::from_secs(secs);
        }
        if let Some(editor) = settings.editor {
            self.editor = editor;
        }
        if let Some(backup) = settings.backup {
            self.backup = backup;
        }
        if let Some(count) = settings.password_count {
            self.password_count = count;
        }
        if let Some(count) = settings.character_count {
            self.character_count = count;
        }
        Ok(())
    }

    /// `<store>.bak`
    pub fn backup_path(&self) -> PathBuf {
        encrypt::backup_path(&self.store_path)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Examples
    ///
    /// ```
    /// use mdp::Config;
    /// use std::path::PathBuf;
    /// use std::time::Duration;
    ///
    /// let mut config = Config::with_dir(PathBuf::from("/home/u/.mdp"));
    /// config.gpg_timeout = Duration::ZERO;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if !self.dir.is_absolute() {
            return Err(AppError::Config(format!(
                "configuration directory must be an absolute path: {}",
                self.dir.display()
            )));
        }
        if self.gpg_path.as_os_str().is_empty() {
            return Err(AppError::Config("gpg_path is empty".to_string()));
        }
        check_timeout("gpg_timeout", self.gpg_timeout)?;
        check_timeout("timeout", self.viewer_timeout)?;
        if self.password_count == 0 {
            return Err(AppError::Config(
                "password_count must be positive".to_string(),
            ));
        }
        if self.character_count == 0 || self.character_count > MAX_PASSWORD_LENGTH {
            return Err(AppError::Config(format!(
                "character_count must be between 1 and {}",
                MAX_PASSWORD_LENGTH
            )));
        }
        validate_editor_command(&self.editor)
    }
}

fn check_timeout(name: &str, timeout: Duration) -> AppResult<()> {
    if timeout.is_zero() || timeout.as_secs() > MAX_TIMEOUT_SECS {
        return Err(AppError::Config(format!(
            "{} must be between 1 and {} seconds",
            name, MAX_TIMEOUT_SECS
        )));
    }
    Ok(())
}

/// Picks the configuration directory from `MDP_DIR` or `HOME`.
pub fn resolve_dir(mdp_dir: Option<String>, home: Option<String>) -> AppResult<PathBuf> {
    match (mdp_dir.filter(|d| !d.is_empty()), home.filter(|h| !h.is_empty())) {
        (Some(dir), _) => expand_path(&dir),
        (None, Some(home)) => Ok(PathBuf::from(home).join(CONFIG_DIR_NAME)),
        (None, None) => Err(AppError::Config(format!(
            "cannot locate configuration directory: set {} or {}",
            ENV_VAR_MDP_DIR, ENV_VAR_HOME
        ))),
    }
}

fn expand_path(raw: &str) -> AppResult<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| AppError::Config(format!("failed to expand path '{}': {}", raw, e)))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Parses config file text.
///
/// # Errors
///
/// Returns `AppError::Config` naming the line for unknown commands or
/// variables, missing or malformed values, and for `gpg_path`, `gpg_key_id`
/// or `editor` set twice.
pub fn parse_settings(text: &str) -> AppResult<Settings> {
    let mut settings = Settings::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| AppError::Config(format!("config:{}: {}", line_no, message));

        let (command, rest) = split_word(line);
        if command != "set" {
            return Err(err(format!("unknown command '{}'", command)));
        }
        let (name, value) = split_word(rest);
        if name.is_empty() {
            return Err(err("missing variable name".to_string()));
        }
        let value = unquote(value);
        if value.is_empty() {
            return Err(err(format!("missing value for '{}'", name)));
        }

        let duplicate = || err(format!("'{}' defined multiple times", name));
        let number = || {
            value
                .parse::<u64>()
                .map_err(|_| err(format!("'{}' expects a number, got '{}'", name, value)))
        };
        let small_number = || {
            number().and_then(|n| {
                u32::try_from(n).map_err(|_| err(format!("'{}' is too large", name)))
            })
        };

        match name {
            "gpg_path" => set_once(&mut settings.gpg_path, value.to_string(), duplicate)?,
            "gpg_key_id" => set_once(&mut settings.gpg_key_id, value.to_string(), duplicate)?,
            "editor" => set_once(&mut settings.editor, value.to_string(), duplicate)?,
            // Later lines win for the remaining variables.
            "gpg_timeout" => settings.gpg_timeout = Some(number()?),
            "timeout" => settings.timeout = Some(number()?),
            "backup" => {
                let on = parse_switch(value)
                    .ok_or_else(|| err(format!("'backup' expects on or off, got '{}'", value)))?;
                settings.backup = Some(on);
            }
            "password_count" => settings.password_count = Some(small_number()?),
            "character_count" => settings.character_count = Some(small_number()?),
            other => return Err(err(format!("unknown variable '{}'", other))),
        }
    }
    Ok(settings)
}

fn set_once<T>(slot: &mut Option<T>, value: T, duplicate: impl Fn() -> AppError) -> AppResult<()> {
    if slot.is_some() {
        return Err(duplicate());
    }
    *slot = Some(value);
    Ok(())
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim()),
        None => (text, ""),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" => Some(true),
        "off" | "no" | "false" => Some(false),
        _ => None,
    }
}

enum FileCheck {
    Missing,
    Invalid(AppError),
}

/// Creates `dir` with mode 0700 if it is missing, then checks it is a
/// directory owned by the user (or root) and not writable by others.
pub fn ensure_private_dir(dir: &Path) -> AppResult<()> {
    let metadata = match fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            DirBuilder::new()
                .recursive(true)
                .mode(DEFAULT_DIR_PERMISSIONS)
                .create(dir)
                .map_err(|e| {
                    AppError::Config(format!("cannot create {}: {}", dir.display(), e))
                })?;
            debug!(dir = %dir.display(), "created configuration directory");
            fs::metadata(dir)?
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(AppError::Config(format!(
            "{}: not a directory",
            dir.display()
        )));
    }
    check_owner_and_mode(dir, &metadata)
}

fn check_private_file(path: &Path) -> Result<(), FileCheck> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FileCheck::Missing),
        Err(e) => return Err(FileCheck::Invalid(e.into())),
    };
    if !metadata.is_file() {
        return Err(FileCheck::Invalid(AppError::Config(format!(
            "{}: not a regular file",
            path.display()
        ))));
    }
    check_owner_and_mode(path, &metadata).map_err(FileCheck::Invalid)
}

fn check_owner_and_mode(path: &Path, metadata: &Metadata) -> AppResult<()> {
    let owner = metadata.uid();
    if owner != 0 && owner != getuid().as_raw() {
        return Err(AppError::Config(format!("{}: bad owner", path.display())));
    }
    if metadata.mode() & FORBIDDEN_WRITE_BITS != 0 {
        return Err(AppError::Config(format!(
            "{}: bad permissions",
            path.display()
        )));
    }
    Ok(())
}
