//! Searching the store: raw output and the interactive viewer.

use crate::config::Config;
use crate::crypto::{load_store, CryptoTool};
use crate::errors::{AppError, AppResult};
use crate::pager::terminal::TerminalScreen;
use crate::pager::{StartMode, Viewer};
use crate::results::keywords::KeywordSet;
use crate::results::{FilterMode, ResultSet};
use crate::session::Session;
use std::io::Write;
use tracing::{debug, info};

/// Checks the tool and decrypts the store, which must hold at least one
/// line.
///
/// # Errors
///
/// Returns `AppError::NoPasswords` for an absent or empty store, and any
/// tool, child or decode error from decryption.
pub fn load_passwords(config: &Config) -> AppResult<ResultSet> {
    let tool = CryptoTool::from_config(config);
    tool.check()?;
    let results = load_store(&tool, &config.store_path)?;
    if results.is_empty() {
        return Err(AppError::NoPasswords);
    }
    Ok(results)
}

/// Writes every line matching `keywords` to `out`, in store order.
///
/// Returns the number of lines written.
pub fn print_matches<W: Write>(
    config: &Config,
    keywords: &KeywordSet,
    mode: FilterMode,
    mut out: W,
) -> AppResult<usize> {
    let mut results = load_passwords(config)?;
    let count = results.filter(keywords, mode)?;
    for entry in results.visible() {
        writeln!(out, "{}", entry.text())?;
    }
    out.flush()?;
    info!(count, "matches printed");
    Ok(count)
}

/// Opens the full-screen viewer on the lines matching `keywords`.
///
/// The terminal is handed back before this returns, on every path. The
/// session is told while the viewer owns the terminal so that a signal
/// arriving meanwhile also restores it.
pub fn view_matches(
    config: &Config,
    session: &Session,
    keywords: &KeywordSet,
    mode: FilterMode,
    start: StartMode,
) -> AppResult<()> {
    let mut results = load_passwords(config)?;
    let count = results.filter(keywords, mode)?;
    debug!(count, ?start, "opening viewer");

    let screen = TerminalScreen::enter()?;
    session.set_screen_active(true);

    let mut viewer = Viewer::new(screen, &mut results, mode, config.viewer_timeout);
    let outcome = viewer.run(start);
    let mut screen = viewer.into_screen();
    let restored = screen.leave();
    session.set_screen_active(false);

    outcome?;
    restored?;
    Ok(())
}
