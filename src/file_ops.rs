//! Small filesystem helpers shared by the channel and the pipeline.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of files still being written. Peers never look for these names.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// `path` with [`PARTIAL_SUFFIX`] appended to its file name.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Delete `path` if it exists. Returns whether something was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Write `bytes` next to `path` and rename into place, so a reader never
/// sees a half-written file under the final name.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let partial = partial_path(path);
    std::fs::write(&partial, bytes)?;
    if let Err(e) = std::fs::rename(&partial, path) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    Ok(())
}

/// Move a file, replacing any existing destination.
///
/// A plain rename is tried first. When that fails (typically a move across
/// filesystems) the file is copied to a partial name beside the destination,
/// renamed into place, and the source removed.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }

    if !from.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", from.display()),
        ));
    }

    let partial = partial_path(to);
    std::fs::copy(from, &partial)?;
    if let Err(e) = std::fs::rename(&partial, to) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("runtime/model.txt")),
            PathBuf::from("runtime/model.txt.partial")
        );
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"x").unwrap();

        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());
    }

    #[test]
    fn test_write_atomic_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.txt");
        write_atomic(&path, b"cuda").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"cuda");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_move_file_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("to.txt");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_move_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = move_file(&dir.path().join("nope"), &dir.path().join("to")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
