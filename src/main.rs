/*!
# mdp

Entry point for the `mdp` binary.

## Usage

```text
mdp [-d] [-c config] [-k key_id] -e
mdp [-d] -g [-l length] [-n count]
mdp [-d] [-Erq] [-c config] [-k key_id] keyword ...

Options:
  -e, --edit             Edit the password list in an external editor
  -g, --generate         Generate random passwords
  -q, --query            Start at the keyword prompt
  -r, --raw              Print matching lines to stdout
  -E, --regex            Treat keywords as regular expressions
  -d, --debug            Enable debug logging
  -c, --config <CONFIG>  Alternative config file
  -k, --key-id <KEY_ID>  Key id used when re-encrypting
  -l, --length <LENGTH>  Length of generated passwords
  -n, --count <COUNT>    Number of generated passwords
```

## Configuration

- `MDP_DIR`: configuration directory (defaults to `~/.mdp`)
- `EDITOR`: editor for `-e` unless the config file sets `editor`
- `MDP_LOG_FORMAT`: `text` (default) or `json`
- `RUST_LOG`: overrides the log level
*/

use mdp::cli::{CliArgs, Command};
use mdp::config::Config;
use mdp::constants::ENV_VAR_MDP_LOG_FORMAT;
use mdp::crypto::CommitOutcome;
use mdp::editor::SystemEditor;
use mdp::errors::AppResult;
use mdp::logging::{self, LogFormat};
use mdp::ops::{self, GeneratorOptions};
use mdp::pager::StartMode;
use mdp::session::{sweep_stale, Session};
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let format = LogFormat::from_env_value(std::env::var(ENV_VAR_MDP_LOG_FORMAT).ok().as_deref());
    logging::init(args.debug, format);
    let span = logging::root_span();
    let _entered = span.enter();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The one place errors are logged and reported.
            error!(error = %err, "mdp failed");
            eprintln!("mdp: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

/// Runs the mode selected on the command line.
///
/// The session is created before anything sensitive exists and dropped
/// last, so every return path below tears it down.
fn run(args: &CliArgs) -> AppResult<()> {
    let command = args.command()?;

    let config = Config::load(&args.overrides())?;
    debug!(?config, "configuration loaded");

    let session = Session::new();
    if !matches!(command, Command::Generate { .. }) {
        session.install_signal_handlers()?;
        let report = sweep_stale(&config.dir)?;
        if !report.removed.is_empty() || report.stale_lock_removed {
            info!(
                removed = report.removed.len(),
                stale_lock = report.stale_lock_removed,
                "recovered from an interrupted session"
            );
        }
    }

    let mode = args.filter_mode();
    match command {
        Command::Raw(keywords) => {
            ops::print_matches(&config, &keywords, mode, io::stdout().lock())?;
        }
        Command::Pager(keywords) => {
            ops::view_matches(&config, &session, &keywords, mode, StartMode::Listing)?
        }
        Command::Query(keywords) => {
            ops::view_matches(&config, &session, &keywords, mode, StartMode::Prompt)?
        }
        Command::Edit => {
            let editor = SystemEditor::new(&config.editor)?;
            if let CommitOutcome::Unchanged = ops::edit_store(&config, &session, &editor)? {
                eprintln!("No changes, exiting...");
            }
        }
        Command::Generate { length, count } => {
            let options = GeneratorOptions::resolve(&config, length, count)?;
            ops::generate_passwords(options, io::stdout().lock())?;
        }
    }

    session.teardown();
    Ok(())
}
