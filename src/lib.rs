/*!
# mdp

mdp keeps a list of passwords in a single gpg-encrypted file and lets you
search it from the terminal without the plaintext ever touching the disk,
except for the duration of an explicit edit session.

## Core Features

- Decrypt the store into memory through a pipe supervised by a watchdog
- Filter lines with case-insensitive keywords or regular expressions
- Show the matches centred in a full-screen viewer that clears itself on exit
- Edit the store in an external editor and re-encrypt it with a backup
- Clean up the plaintext file, the lock and the terminal on every exit path
- Generate random passwords

## Architecture

- `cli`: command-line parsing using clap
- `config`: configuration directory, config file and permission checks
- `errors`: error types and exit codes
- `process`: child process supervision and the watchdog timer
- `crypto`: the encryption tool, decryption channel and re-encryption writer
- `results`: the in-memory result set and its filters
- `pager`: the interactive viewer
- `session`: the lock, teardown on signals and the stale-file sweep
- `ops`: the operations behind each mode

## Usage Example

```rust,no_run
use mdp::config::{Config, Overrides};
use mdp::results::keywords::KeywordSet;
use mdp::results::FilterMode;

fn main() -> mdp::AppResult<()> {
    let config = Config::load(&Overrides::default())?;
    let keywords = KeywordSet::from_args(["github"]);
    mdp::ops::print_matches(&config, &keywords, FilterMode::Plain, std::io::stdout())?;
    Ok(())
}
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Encryption tool invocation, decryption and re-encryption
pub mod crypto;
/// External editor launching
pub mod editor;
/// Error types and utilities for error handling
pub mod errors;
/// Tracing subscriber setup
pub mod logging;
/// Operations behind each command-line mode
pub mod ops;
/// Full-screen viewer
pub mod pager;
/// Child process supervision
pub mod process;
/// Decrypted lines and filtering
pub mod results;
/// Lock, teardown and stale-file recovery
pub mod session;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult};
