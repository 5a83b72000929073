//! Constants used throughout the application.
//!
//! This module contains the constants used by mdp, organized into logical
//! groups: application metadata, environment variables, file layout inside the
//! configuration directory, configuration defaults and viewer limits.

use std::time::Duration;

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "mdp";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "Search and edit a gpg-encrypted password list";

// Logging
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level. Kept quiet so the terminal is not cluttered next to passwords.
pub const DEFAULT_LOG_LEVEL: &str = "warn";
/// Log level used when `--debug` is passed.
pub const DEBUG_LOG_LEVEL: &str = "debug";
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "mdp";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";

// Environment Variables
/// Overrides the configuration directory.
pub const ENV_VAR_MDP_DIR: &str = "MDP_DIR";
/// Selects the log output format (`text` or `json`).
pub const ENV_VAR_MDP_LOG_FORMAT: &str = "MDP_LOG_FORMAT";
/// Standard environment variable for specifying the default editor.
pub const ENV_VAR_EDITOR: &str = "EDITOR";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";

// Configuration Directory Layout
/// Name of the configuration directory inside the home directory.
pub const CONFIG_DIR_NAME: &str = ".mdp";
/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config";
/// Encrypted store file name.
pub const STORE_FILE_NAME: &str = "passwords";
/// Lock marker file name.
pub const LOCK_FILE_NAME: &str = "lock";
/// Suffix appended to the store path for the backup hardlink.
pub const BACKUP_SUFFIX: &str = ".bak";
/// Prefix of the plaintext files created for edit sessions.
pub const TEMP_FILE_PREFIX: &str = "tmp_edit.";
/// Suffix the encryption tool appends to its input path.
pub const ENCRYPTED_SUFFIX: &str = ".gpg";

// Configuration Defaults
/// Default path of the encryption tool.
pub const DEFAULT_GPG_PATH: &str = "/usr/bin/gpg";
/// Default number of seconds the decryption child may run.
pub const DEFAULT_GPG_TIMEOUT_SECS: u64 = 10;
/// Default number of seconds the viewer waits for a key.
pub const DEFAULT_VIEWER_TIMEOUT_SECS: u64 = 10;
/// Default command for the editor if not specified otherwise.
pub const DEFAULT_EDITOR_COMMAND: &str = "vi";
/// Default number of passwords printed by `-g`.
pub const DEFAULT_PASSWORD_COUNT: u32 = 4;
/// Default length of generated passwords.
pub const DEFAULT_CHARACTER_COUNT: u32 = 16;
/// Longest timeout, in seconds, either `gpg_timeout` or `timeout` may be set to.
pub const MAX_TIMEOUT_SECS: u64 = i32::MAX as u64;
/// Exit status for configuration errors.
pub const CONFIG_ERROR_EXIT_CODE: u8 = 100;
/// Exit status after Ctrl-C in the viewer, matching a SIGINT exit.
pub const INTERRUPT_EXIT_CODE: u8 = 130;

// Validation
/// Characters forbidden in editor commands for security reasons.
pub const EDITOR_FORBIDDEN_CHARS: &[char] =
    &['|', '&', ';', '$', '(', ')', '`', '\\', '<', '>', '\'', '"'];
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";
/// Editors that create swap files unless started with `-n`.
pub const SWAPFILE_EDITORS: &[&str] = &["vim", "vi", "nvim"];
/// Marker that `--list-secret-keys` prints for each secret key.
pub const SECRET_KEY_MARKER: &str = "sec";

// Password Generation
/// Longest password `-g` will produce.
pub const MAX_PASSWORD_LENGTH: u32 = 255;
/// Character set used for generated passwords.
pub const CHARSET_ALPHANUMERIC: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Viewer
/// Upper bound on the number of results the viewer will lay out.
pub const RESULTS_MAX_LEN: usize = 128;
/// Shown instead of the listing when the results do not fit.
pub const MSG_TOO_MANY_RESULTS: &str = "Too many results, please refine your search.";
/// Prompt shown on the last row when refining the search.
pub const KEYWORD_PROMPT: &str = "Keywords: ";
/// Longest keyword line accepted at the prompt, in characters.
pub const KEYWORD_LINE_MAX_LEN: usize = 50;
/// Key that opens the keyword prompt.
pub const REFINE_KEY: char = '/';

// Child Processes
/// How often a finishing child is polled for exit.
pub const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

// File System Parameters
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;
/// Permission bits that must be clear on the directory and files mdp trusts.
#[cfg(unix)]
pub const FORBIDDEN_WRITE_BITS: u32 = 0o022;
/// Size of the zero buffer used when overwriting plaintext before unlink.
pub const SECURE_DELETE_CHUNK: usize = 4096;
