//! Timeout supervision for a single child process.
//!
//! A [`Watchdog`] runs on its own thread. When its countdown expires it sends
//! `SIGINT` to the child it was armed for, provided that child is still owned
//! by a live [`ManagedChild`](super::ManagedChild) and has not been reaped.
//! The watchdog only holds a weak reference to the child, so it never keeps
//! the process handle alive and never signals a recycled pid.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// An armed countdown protecting one child process.
///
/// Dropping an un-cancelled watchdog cancels it.
#[derive(Debug)]
pub struct Watchdog {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    /// Starts a countdown that interrupts `target` after `timeout`.
    ///
    /// `label` identifies the child in the timeout diagnostic.
    pub fn arm(target: Weak<Mutex<Child>>, label: String, timeout: Duration) -> io::Result<Self> {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_flag = Arc::clone(&fired);

        let handle = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || match cancel_rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => expire(&target, &label, timeout, &fired_flag),
                // Cancelled, or the owner went away without cancelling.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            })?;

        debug!(timeout_secs = timeout.as_secs(), "watchdog armed");
        Ok(Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
            fired,
        })
    }

    /// Whether the countdown expired and the interrupt was delivered.
    fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stops the countdown and waits for the watchdog thread to finish.
    ///
    /// Returns whether the watchdog had already fired. Cancelling a fired
    /// watchdog is not an error.
    pub fn cancel(mut self) -> bool {
        self.stop();
        self.fired()
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The thread may already be gone after firing.
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn expire(target: &Weak<Mutex<Child>>, label: &str, timeout: Duration, fired: &AtomicBool) {
    let Some(child) = target.upgrade() else {
        debug!("watchdog expired after its child was released");
        return;
    };
    // Holding the lock keeps the child from being reaped while it is signalled.
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);

    match child.try_wait() {
        Ok(None) => {}
        Ok(Some(_)) => {
            debug!("watchdog expired after its child exited");
            return;
        }
        Err(error) => {
            warn!(%error, "watchdog could not query child state");
            return;
        }
    }

    let Ok(raw_pid) = i32::try_from(child.id()) else {
        warn!(pid = child.id(), "child pid out of range");
        return;
    };

    match kill(Pid::from_raw(raw_pid), Signal::SIGINT) {
        Ok(()) => {
            fired.store(true, Ordering::SeqCst);
            warn!(
                command = %label,
                timeout_secs = timeout.as_secs(),
                "{label} timed out, aborting"
            );
        }
        Err(Errno::ESRCH) => debug!(pid = raw_pid, "child already gone"),
        Err(errno) => warn!(pid = raw_pid, %errno, "failed to interrupt child"),
    }
}
