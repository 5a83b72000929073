//! Session guard: the lock, the live plaintext file, the terminal, and the
//! single teardown that cleans them up.
//!
//! A [`Session`] is created once per invocation. Whatever it has been told
//! about (a held lock, a plaintext file, an active viewer) is cleaned up
//! exactly once, either when the session is dropped on the normal and error
//! paths, or from the signal listener when the process is interrupted. The
//! teardown order is fixed: destroy the plaintext file, release the lock,
//! restore the terminal.
//!
//! `SIGKILL` cannot be intercepted; anything it leaves behind is recovered by
//! [`sweep::sweep_stale`] on the next start.

pub mod lock;
pub mod sweep;

pub use lock::LockToken;
pub use sweep::{sweep_stale, SweepReport};

use crate::crypto::temp::secure_delete;
use crate::errors::AppResult;
use crate::pager::terminal;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, warn};

/// Signals that trigger teardown before the process exits.
pub const TEARDOWN_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

#[derive(Debug, Default)]
struct SessionState {
    torn_down: AtomicBool,
    teardown_running: Mutex<()>,
    lock: Mutex<Option<LockToken>>,
    plaintext: Mutex<Option<PathBuf>>,
    screen_active: AtomicBool,
}

/// The per-invocation cleanup context.
#[derive(Debug, Default)]
pub struct Session {
    state: Arc<SessionState>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a listener thread that tears the session down and exits with
    /// `128 + signal` when a termination signal arrives.
    pub fn install_signal_handlers(&self) -> AppResult<()> {
        let mut signals = Signals::new(TEARDOWN_SIGNALS)?;
        let state = Arc::clone(&self.state);
        thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    warn!(signal, "interrupted, cleaning up");
                    state.teardown();
                    std::process::exit(128 + signal);
                }
            })?;
        debug!("signal handlers installed");
        Ok(())
    }

    /// Takes the edit lock at `path` and ties it to this session.
    pub fn acquire_lock(&self, path: &Path) -> AppResult<()> {
        let token = lock::acquire(path)?;
        *guard(&self.state.lock) = Some(token);
        Ok(())
    }

    /// Releases the edit lock now, if held.
    pub fn release_lock(&self) -> AppResult<()> {
        if let Some(mut token) = guard(&self.state.lock).take() {
            token.release()?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn holds_lock(&self) -> bool {
        guard(&self.state.lock).is_some()
    }

    /// Registers a plaintext file to be destroyed on teardown.
    pub fn track_plaintext(&self, path: PathBuf) {
        *guard(&self.state.plaintext) = Some(path);
    }

    /// Destroys the registered plaintext file now.
    pub fn destroy_plaintext(&self) -> AppResult<()> {
        if let Some(path) = guard(&self.state.plaintext).take() {
            secure_delete(&path)?;
        }
        Ok(())
    }

    /// Records whether the full-screen viewer currently owns the terminal.
    pub fn set_screen_active(&self, active: bool) {
        self.state.screen_active.store(active, Ordering::SeqCst);
    }

    /// Runs teardown. Only the first call does any work; concurrent callers
    /// wait until it has finished.
    pub fn teardown(&self) {
        self.state.teardown();
    }

    #[cfg(test)]
    fn is_torn_down(&self) -> bool {
        self.state.torn_down.load(Ordering::SeqCst)
    }
}

impl SessionState {
    fn teardown(&self) {
        let _running = guard(&self.teardown_running);
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(path) = guard(&self.plaintext).take() {
            if let Err(error) = secure_delete(&path) {
                warn!(file = %path.display(), %error, "failed to destroy plaintext file");
            }
        }

        if let Some(mut token) = guard(&self.lock).take() {
            if let Err(error) = token.release() {
                warn!(lock = %token.path().display(), %error, "failed to release lock");
            }
        }

        if self.screen_active.swap(false, Ordering::SeqCst) {
            if let Err(error) = terminal::restore() {
                warn!(%error, "failed to restore terminal");
            }
        }
        debug!("session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_teardown_destroys_plaintext_and_releases_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let plain = dir.path().join("tmp_edit.1");
        fs::write(&plain, "secret").unwrap();

        let session = Session::new();
        session.acquire_lock(&lock_path).unwrap();
        session.track_plaintext(plain.clone());
        assert!(session.holds_lock());

        session.teardown();

        assert!(!plain.exists());
        assert!(!lock_path.exists());
        assert!(session.is_torn_down());
    }

    #[test]
    fn test_teardown_runs_once() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let session = Session::new();
        session.acquire_lock(&lock_path).unwrap();
        session.teardown();

        // A marker created afterwards by another session must survive.
        fs::write(&lock_path, "1\n").unwrap();
        session.teardown();
        drop(session);
        assert!(lock_path.exists());
    }

    #[test]
    fn test_drop_tears_down() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        {
            let session = Session::new();
            session.acquire_lock(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_second_session_cannot_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let first = Session::new();
        first.acquire_lock(&lock_path).unwrap();

        let second = Session::new();
        assert!(second.acquire_lock(&lock_path).is_err());
        assert!(!second.holds_lock());
        drop(second);
        assert!(lock_path.exists(), "failed session must not remove the owner's lock");
    }

    #[test]
    fn test_explicit_release_and_destroy() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let plain = dir.path().join("tmp_edit.2");
        fs::write(&plain, "secret").unwrap();

        let session = Session::new();
        session.acquire_lock(&lock_path).unwrap();
        session.track_plaintext(plain.clone());
        session.destroy_plaintext().unwrap();
        session.release_lock().unwrap();
        session.release_lock().unwrap();

        assert!(!plain.exists());
        assert!(!lock_path.exists());
    }
}
