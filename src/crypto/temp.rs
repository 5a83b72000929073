//! Private plaintext files for edit sessions and their secure destruction.

use crate::constants::{SECURE_DELETE_CHUNK, TEMP_FILE_PREFIX};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Creates an empty, owner-only file named `tmp_edit.<random>` in `dir`.
///
/// The file is not removed automatically; the caller hands the path to the
/// session so that [`secure_delete`] runs on every exit path.
pub fn create_plaintext_file(dir: &Path) -> io::Result<(File, PathBuf)> {
    let named = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)?;
    let (file, path) = named.keep().map_err(|e| e.error)?;
    debug!(path = %path.display(), "created plaintext file");
    Ok((file, path))
}

/// Whether `path` is named like a plaintext file this crate creates.
pub fn is_plaintext_file_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX))
}

/// Overwrites a regular file with zeros, syncs it and unlinks it.
///
/// Returns `false` if there was nothing to delete. Anything that is not a
/// regular file (a symlink, say) is unlinked without being written through.
pub fn secure_delete(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if metadata.is_file() {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let zeros = [0u8; SECURE_DELETE_CHUNK];
        let mut remaining = metadata.len();
        while remaining > 0 {
            let n = remaining.min(SECURE_DELETE_CHUNK as u64) as usize;
            file.write_all(&zeros[..n])?;
            remaining -= n as u64;
        }
        file.sync_all()?;
    }

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    }
    debug!(path = %path.display(), "securely deleted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use tempfile::tempdir;

    #[test]
    fn test_plaintext_file_is_private_and_prefixed() {
        let dir = tempdir().unwrap();
        let (_file, path) = create_plaintext_file(dir.path()).unwrap();

        assert!(is_plaintext_file_name(&path));
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(fs::metadata(&path).unwrap().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_plaintext_file_survives_handle_drop() {
        let dir = tempdir().unwrap();
        let (file, path) = create_plaintext_file(dir.path()).unwrap();
        drop(file);
        assert!(path.exists());
    }

    #[test]
    fn test_secure_delete_overwrites_through_hardlink_and_unlinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tmp_edit.x");
        let witness = dir.path().join("witness");
        fs::write(&path, "secret password\n").unwrap();
        fs::hard_link(&path, &witness).unwrap();

        assert!(secure_delete(&path).unwrap());

        assert!(!path.exists());
        assert_eq!(fs::read(&witness).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_secure_delete_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        assert!(!secure_delete(&dir.path().join("tmp_edit.gone")).unwrap());
    }

    #[test]
    fn test_secure_delete_does_not_follow_symlinks() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, "keep me").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o600)).unwrap();
        let link = dir.path().join("tmp_edit.link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(secure_delete(&link).unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
    }

    #[test]
    fn test_name_matching() {
        assert!(is_plaintext_file_name(Path::new("/d/tmp_edit.AbC123")));
        assert!(!is_plaintext_file_name(Path::new("/d/passwords")));
    }
}
