//! Edit the store through a plaintext file and re-encrypt it.

use crate::config::Config;
use crate::crypto::{create_plaintext_file, load_store, CommitOutcome, CryptoTool, StoreWriter};
use crate::editor::Editor;
use crate::errors::AppResult;
use crate::results::Fingerprint;
use crate::session::sweep::sweep_plaintext_files;
use crate::session::Session;
use std::io::{BufWriter, Write};
use tracing::{debug, info};

/// Runs one edit session.
///
/// # Flow
///
/// 1. Check the encryption tool
/// 2. Take the edit lock, held by `session` until the end
/// 3. Destroy plaintext files left by crashed sessions
/// 4. Decrypt the store (an absent store starts empty)
/// 5. Write the lines to a private temporary file tracked by `session`
/// 6. Fingerprint it and open it in `editor`
/// 7. Re-encrypt if the fingerprint changed
/// 8. Destroy the temporary file and release the lock
///
/// If any step fails, dropping or tearing down `session` performs step 8.
///
/// # Errors
///
/// Returns an error if the tool check fails, another session holds the lock,
/// decryption or encryption fails, or the editor reports failure. The store
/// is left untouched in each of these cases.
pub fn edit_store(
    config: &Config,
    session: &Session,
    editor: &dyn Editor,
) -> AppResult<CommitOutcome> {
    let tool = CryptoTool::from_config(config);
    tool.check()?;

    session.acquire_lock(&config.lock_path)?;
    let swept = sweep_plaintext_files(&config.dir)?;
    if !swept.is_empty() {
        debug!(count = swept.len(), "destroyed leftover plaintext files");
    }

    let results = load_store(&tool, &config.store_path)?;
    let loaded = results.fingerprint();

    let (file, path) = create_plaintext_file(&config.dir)?;
    session.track_plaintext(path.clone());

    let mut writer = BufWriter::new(file);
    results.write_plaintext(&mut writer)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);
    drop(results);

    let baseline = Fingerprint::of_file(&path)?;
    debug!(
        bytes = baseline.size(),
        normalised = was_normalised(loaded, &baseline),
        "plaintext written, opening editor"
    );
    editor.edit(&path)?;

    let outcome =
        StoreWriter::new(&tool, &config.store_path, config.backup).commit(&path, &baseline)?;

    session.destroy_plaintext()?;
    session.release_lock()?;

    if let CommitOutcome::Committed { backup } = &outcome {
        info!(backup = ?backup, "edit committed");
    }
    Ok(outcome)
}

/// Whether writing the store out changed its bytes, by dropping trailing
/// whitespace or adding a final newline. Such changes are only committed
/// together with a real edit, since the baseline is the written file.
fn was_normalised(loaded: Option<Fingerprint>, baseline: &Fingerprint) -> bool {
    loaded.is_some_and(|loaded| loaded != *baseline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, EditorError};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Tool that `cat`s on decrypt and copies on encrypt.
    fn config_in(dir: &Path) -> Config {
        let tool = dir.join("fake-gpg");
        fs::write(
            &tool,
            "#!/bin/sh\n\
             case \"$1\" in\n\
             --version) exit 0 ;;\n\
             --list-secret-keys) echo 'sec   ed25519'; exit 0 ;;\n\
             -q) cat \"$3\" ;;\n\
             -r) cp \"$4\" \"$4.gpg\" ;;\n\
             -e) cp \"$2\" \"$2.gpg\" ;;\n\
             esac\n",
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        let mut config = Config::with_dir(dir.to_path_buf());
        config.gpg_path = tool;
        config
    }

    /// Records what the plaintext held and optionally rewrites it.
    struct ScriptedEditor {
        replacement: Option<&'static str>,
        seen: Mutex<Option<(PathBuf, String, u32)>>,
    }

    impl ScriptedEditor {
        fn new(replacement: Option<&'static str>) -> Self {
            Self {
                replacement,
                seen: Mutex::new(None),
            }
        }
    }

    impl Editor for ScriptedEditor {
        fn edit(&self, path: &Path) -> AppResult<()> {
            let text = fs::read_to_string(path)?;
            let mode = fs::metadata(path)?.permissions().mode() & 0o777;
            *self.seen.lock().unwrap() = Some((path.to_path_buf(), text, mode));
            if let Some(replacement) = self.replacement {
                fs::write(path, replacement)?;
            }
            Ok(())
        }
    }

    struct FailingEditor;

    impl Editor for FailingEditor {
        fn edit(&self, _path: &Path) -> AppResult<()> {
            Err(EditorError::NonZeroExit {
                command: "vi".to_string(),
                status_code: 1,
            }
            .into())
        }
    }

    #[test]
    fn test_unchanged_edit_leaves_store_alone() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.store_path, "a\nb\n").unwrap();
        let session = Session::new();
        let editor = ScriptedEditor::new(None);

        let outcome = edit_store(&config, &session, &editor).unwrap();

        assert_eq!(outcome, CommitOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&config.store_path).unwrap(), "a\nb\n");
        assert!(!config.backup_path().exists());
        assert!(!config.lock_path.exists());

        let (path, text, mode) = editor.seen.lock().unwrap().take().unwrap();
        assert_eq!(text, "a\nb\n");
        assert_eq!(mode, 0o600);
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists(), "plaintext must be destroyed");
    }

    #[test]
    fn test_changed_edit_replaces_store_and_keeps_backup() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.store_path, "a\nb\n").unwrap();
        let session = Session::new();

        let outcome = edit_store(&config, &session, &ScriptedEditor::new(Some("a\nc\n"))).unwrap();

        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                backup: Some(config.backup_path())
            }
        );
        assert_eq!(fs::read_to_string(&config.store_path).unwrap(), "a\nc\n");
        assert_eq!(fs::read_to_string(config.backup_path()).unwrap(), "a\nb\n");
        let mode = fs::metadata(&config.store_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!config.lock_path.exists());
    }

    #[test]
    fn test_first_edit_creates_store() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let session = Session::new();
        let editor = ScriptedEditor::new(Some("site1 alice pw\n"));

        edit_store(&config, &session, &editor).unwrap();

        let (_, text, _) = editor.seen.lock().unwrap().take().unwrap();
        assert_eq!(text, "");
        assert_eq!(
            fs::read_to_string(&config.store_path).unwrap(),
            "site1 alice pw\n"
        );
        assert!(!config.backup_path().exists());
    }

    #[test]
    fn test_editor_failure_keeps_store_and_cleans_up() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.store_path, "a\n").unwrap();
        let session = Session::new();

        let result = edit_store(&config, &session, &FailingEditor);
        assert!(matches!(result, Err(AppError::Editor(_))));
        assert!(config.lock_path.exists(), "lock held until teardown");

        session.teardown();
        assert!(!config.lock_path.exists());
        assert_eq!(fs::read_to_string(&config.store_path).unwrap(), "a\n");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("tmp_edit."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_session_is_refused() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let holder = Session::new();
        holder.acquire_lock(&config.lock_path).unwrap();

        let session = Session::new();
        let result = edit_store(&config, &session, &ScriptedEditor::new(Some("x\n")));
        assert!(matches!(result, Err(AppError::Lock(_))));
        assert!(!config.store_path.exists());
    }

    #[test]
    fn test_leftover_plaintext_is_swept() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let stale = dir.path().join("tmp_edit.crashed");
        fs::write(&stale, "old secrets").unwrap();

        edit_store(&config, &Session::new(), &ScriptedEditor::new(None)).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_normalisation_detected_against_loaded_fingerprint() {
        use crate::results::ResultSet;
        use std::io::Cursor;

        let written = |raw: &str| {
            let set = ResultSet::load(Cursor::new(raw.as_bytes().to_vec())).unwrap();
            let mut out = Vec::new();
            set.write_plaintext(&mut out).unwrap();
            (set.fingerprint(), Fingerprint::of_bytes(&out))
        };

        let (loaded, baseline) = written("a\nb\n");
        assert!(!was_normalised(loaded, &baseline));

        let (loaded, baseline) = written("a  \nb");
        assert!(was_normalised(loaded, &baseline));

        assert!(!was_normalised(None, &Fingerprint::of_bytes(b"")));
    }
}
