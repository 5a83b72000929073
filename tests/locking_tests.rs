
use mdp::session::lock;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};
use test_helpers::TestEnv;

/// A guard that ensures child processes are properly cleaned up
struct ChildProcessGuard {
    child: std::process::Child,
}

impl Drop for ChildProcessGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Pid of a process that has already exited.
fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn test_edit_refused_while_another_session_holds_the_lock() {
    let env = TestEnv::new();
    env.write_store("x\n");
    let _held = lock::acquire(&env.lock_path()).unwrap();

    env.command()
        .arg("-e")
        .env("EDITOR", "true")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "by process {}",
            std::process::id()
        )));

    assert!(env.lock_path().exists(), "the owner's lock must survive");
    assert_eq!(env.read_store(), "x\n");
}

#[test]
fn test_stale_lock_and_plaintext_are_swept_at_startup() {
    let env = TestEnv::new();
    env.write_store("site1 a\n");
    fs::write(env.lock_path(), format!("{}\n", dead_pid())).unwrap();
    let leftover = env.dir.join("tmp_edit.crashed");
    test_helpers::write_private(&leftover, "site1 a\n");

    env.command()
        .args(["-r", "site1"])
        .assert()
        .success()
        .stdout("site1 a\n")
        .stderr(predicate::str::contains("removing stale lock"))
        .stderr(predicate::str::contains("removing stale temporary file"));

    assert!(!env.lock_path().exists());
    assert!(!leftover.exists());
}

#[test]
fn test_active_session_files_are_not_swept() {
    let env = TestEnv::new();
    env.write_store("site1 a\n");
    let _held = lock::acquire(&env.lock_path()).unwrap();
    let live = env.dir.join("tmp_edit.live");
    test_helpers::write_private(&live, "site1 a\n");

    env.command().args(["-r", "site1"]).assert().success();

    assert!(live.exists(), "a running edit session's plaintext must survive");
    assert!(env.lock_path().exists());
}

#[test]
fn test_unreadable_lock_marker_is_treated_as_active() {
    let env = TestEnv::new();
    env.write_store("site1 a\n");
    fs::write(env.lock_path(), "not a pid\n").unwrap();
    let leftover = env.dir.join("tmp_edit.unknown");
    test_helpers::write_private(&leftover, "site1 a\n");

    env.command().args(["-r", "site1"]).assert().success();

    assert!(env.lock_path().exists());
    assert!(leftover.exists());
}

#[test]
#[serial]
fn test_sigterm_during_edit_cleans_up() {
    let env = TestEnv::new();
    env.write_store("secret line\n");
    let editor = env.write_script("slow-editor", "exec sleep 5");

    let child = env
        .std_command()
        .arg("-e")
        .env("EDITOR", &editor)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut guard = ChildProcessGuard { child };

    wait_for("the plaintext file", || !env.plaintext_files().is_empty());
    let plaintext = env.plaintext_files();
    assert!(env.lock_path().exists());

    kill(Pid::from_raw(guard.child.id() as i32), Signal::SIGTERM).unwrap();
    let status = guard.child.wait().unwrap();

    assert_eq!(status.code(), Some(128 + Signal::SIGTERM as i32));
    for path in plaintext {
        assert!(!path.exists(), "{} survived", path.display());
    }
    assert!(!env.lock_path().exists());
    assert_eq!(env.read_store(), "secret line\n");
}
