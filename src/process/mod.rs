//! Managed child operations for the external encryption tool.
//!
//! [`run`] starts a child with its standard output piped back to the caller,
//! [`ManagedChild::supervise`] arms a [`Watchdog`] against it, and
//! [`ManagedChild::finish`] reaps it and classifies how it ended. The rest of
//! the crate never touches pids or wait statuses directly.

pub mod watchdog;

pub use watchdog::Watchdog;

use crate::constants::REAP_POLL_INTERVAL;
use crate::errors::ChildError;
use std::ffi::OsString;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Exited with status zero.
    Success,
    /// Exited with a non-zero status.
    Failed {
        /// The exit status code
        code: i32,
    },
    /// Terminated by a signal.
    Signaled {
        /// The terminating signal number
        signal: i32,
        /// Whether the watchdog sent it
        timed_out: bool,
    },
}

impl ExitClassification {
    /// Classifies a wait status.
    pub fn from_status(status: ExitStatus, timed_out: bool) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => ExitClassification::Success,
            (Some(code), _) => ExitClassification::Failed { code },
            (None, Some(signal)) => ExitClassification::Signaled { signal, timed_out },
            // Stopped or continued statuses are never returned by wait.
            (None, None) => ExitClassification::Failed { code: -1 },
        }
    }

    /// Converts a non-successful classification into the matching error.
    pub fn into_result(self, command: &str) -> Result<(), ChildError> {
        match self {
            ExitClassification::Success => Ok(()),
            ExitClassification::Failed { code } => Err(ChildError::NonZeroExit {
                command: command.to_string(),
                code,
            }),
            ExitClassification::Signaled { signal, timed_out } => Err(ChildError::Signaled {
                command: command.to_string(),
                signal,
                timed_out,
            }),
        }
    }
}

/// Human-readable command line used in diagnostics.
pub fn describe(program: &Path, args: &[OsString]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// A spawned child owned by the caller until [`ManagedChild::finish`].
///
/// The child is shared with at most one watchdog through a weak reference.
/// Dropping an unfinished `ManagedChild` kills and reaps the child.
#[derive(Debug)]
pub struct ManagedChild {
    child: Arc<Mutex<Child>>,
    command: String,
    watchdog: Option<Watchdog>,
    finished: bool,
}

/// Starts `program` with `args`, piping its standard output to the caller.
///
/// Standard input and standard error are inherited so the tool can prompt
/// for a passphrase.
pub fn run(program: &Path, args: &[OsString]) -> Result<(ChildStdout, ManagedChild), ChildError> {
    let command = describe(program, args);
    debug!(command = %command, "spawning child");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ChildError::Spawn {
            command: command.clone(),
            source,
        })?;

    let Some(stdout) = child.stdout.take() else {
        // Cannot happen with Stdio::piped, but never leave the child running.
        let _ = child.kill();
        let _ = child.wait();
        return Err(ChildError::Spawn {
            command,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "child stdout not captured"),
        });
    };

    Ok((
        stdout,
        ManagedChild {
            child: Arc::new(Mutex::new(child)),
            command,
            watchdog: None,
            finished: false,
        },
    ))
}

/// Runs `program` to completion with inherited standard streams.
pub fn run_to_completion(
    program: &Path,
    args: &[OsString],
) -> Result<ExitClassification, ChildError> {
    let command = describe(program, args);
    debug!(command = %command, "running child");

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| ChildError::Spawn { command, source })?;
    Ok(ExitClassification::from_status(status, false))
}

impl ManagedChild {
    /// The command line this child runs.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The child's process id.
    pub fn id(&self) -> u32 {
        self.lock().id()
    }

    /// Arms a watchdog that interrupts the child after `timeout`.
    ///
    /// Only one watchdog is active per child; re-arming replaces (and
    /// cancels) the previous one.
    pub fn supervise(&mut self, timeout: Duration) -> io::Result<()> {
        if let Some(previous) = self.watchdog.take() {
            previous.cancel();
        }
        let watchdog = Watchdog::arm(Arc::downgrade(&self.child), self.command.clone(), timeout)?;
        self.watchdog = Some(watchdog);
        Ok(())
    }

    /// Waits for the child to exit, cancels its watchdog and classifies the
    /// result.
    ///
    /// The child is polled rather than waited on so that the watchdog can
    /// take the lock and interrupt it in the meantime.
    pub fn finish(mut self) -> io::Result<ExitClassification> {
        let status = loop {
            if let Some(status) = self.lock().try_wait()? {
                break status;
            }
            thread::sleep(REAP_POLL_INTERVAL);
        };
        self.finished = true;

        let timed_out = self.watchdog.take().map(Watchdog::cancel).unwrap_or(false);
        let classification = ExitClassification::from_status(status, timed_out);
        debug!(command = %self.command, ?classification, "child finished");
        Ok(classification)
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.cancel();
        }
        if self.finished {
            return;
        }
        let mut child = self.lock();
        if let Ok(None) = child.try_wait() {
            warn!(command = %self.command, "terminating unfinished child");
            let _ = child.kill();
        }
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;

    fn sh(script: &str) -> (PathBuf, Vec<OsString>) {
        (
            PathBuf::from("/bin/sh"),
            vec![OsString::from("-c"), OsString::from(script)],
        )
    }

    #[test]
    fn test_successful_child_streams_output() {
        let (program, args) = sh("printf 'one\\ntwo\\n'");
        let (mut stdout, child) = run(&program, &args).expect("spawn");

        let mut output = String::new();
        stdout.read_to_string(&mut output).unwrap();
        assert_eq!(output, "one\ntwo\n");
        assert_eq!(child.finish().unwrap(), ExitClassification::Success);
    }

    #[test]
    fn test_non_zero_exit_is_classified_as_failure() {
        let (program, args) = sh("exit 3");
        let (_stdout, child) = run(&program, &args).expect("spawn");
        assert_eq!(
            child.finish().unwrap(),
            ExitClassification::Failed { code: 3 }
        );
    }

    #[test]
    fn test_watchdog_kill_is_classified_as_signaled() {
        let (program, args) = sh("exec sleep 30");
        let (mut stdout, mut child) = run(&program, &args).expect("spawn");
        child.supervise(Duration::from_millis(200)).unwrap();

        let mut output = Vec::new();
        stdout.read_to_end(&mut output).unwrap();
        let classification = child.finish().unwrap();
        assert_eq!(
            classification,
            ExitClassification::Signaled {
                signal: nix::sys::signal::Signal::SIGINT as i32,
                timed_out: true,
            }
        );
        assert!(classification.into_result("sleep").is_err());
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let result = run(Path::new("/nonexistent/gpg"), &[]);
        assert!(matches!(result, Err(ChildError::Spawn { .. })));
    }

    #[test]
    fn test_dropping_unfinished_child_reaps_it() {
        let (program, args) = sh("exec sleep 30");
        let (_stdout, child) = run(&program, &args).expect("spawn");
        let pid = child.id() as i32;
        drop(child);

        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
        assert!(!alive, "child must not outlive its handle");
    }

    #[test]
    fn test_describe_joins_arguments() {
        let args = vec![OsString::from("-q"), OsString::from("--decrypt")];
        assert_eq!(describe(Path::new("gpg"), &args), "gpg -q --decrypt");
    }
}
