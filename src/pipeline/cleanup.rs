//! Scratch-file creation and best-effort removal.
//!
//! Every file the orchestrator places in the scratch directory is owned by a
//! [`ScratchFile`], which deletes it on drop. Drop runs on early returns and
//! panic unwinds as well, so temporary artifacts cannot outlive the tool call
//! that created them.

use crate::error::ConvertError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Remove `path`, treating "already gone" as success.
///
/// Failures are logged and never returned; calling this twice on the same
/// path is harmless.
pub fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// A file in the scratch directory owned exclusively by the orchestrator.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create a uniquely named, empty file in `dir` and take ownership of it.
    ///
    /// The random component comes from [`tempfile`], which opens with
    /// `O_EXCL`, so concurrent calls can never hand out the same name.
    pub fn create(dir: &Path, prefix: &str, suffix: &str) -> Result<Self, ConvertError> {
        std::fs::create_dir_all(dir).map_err(|source| ConvertError::ScratchIo {
            path: dir.to_path_buf(),
            source,
        })?;
        let named = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .rand_bytes(12)
            .tempfile_in(dir)
            .map_err(|source| ConvertError::ScratchIo {
                path: dir.to_path_buf(),
                source,
            })?;
        let (_file, path) = named.keep().map_err(|e| ConvertError::ScratchIo {
            path: dir.to_path_buf(),
            source: e.error,
        })?;
        Ok(Self { path })
    }

    /// Create a scratch file and fill it with `bytes`.
    pub async fn write(
        dir: &Path,
        prefix: &str,
        suffix: &str,
        bytes: &[u8],
    ) -> Result<Self, ConvertError> {
        let (dir, prefix, suffix) = (dir.to_path_buf(), prefix.to_string(), suffix.to_string());
        let file = tokio::task::spawn_blocking(move || Self::create(&dir, &prefix, &suffix))
            .await
            .map_err(|e| ConvertError::Internal(format!("Scratch file task failed: {e}")))??;
        tokio::fs::write(&file.path, bytes)
            .await
            .map_err(|source| ConvertError::ScratchIo {
                path: file.path.clone(),
                source,
            })?;
        Ok(file)
    }

    /// Take ownership of an existing path (e.g. a worker output).
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_best_effort(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn remove_twice_is_harmless() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("a.txt");
        std::fs::write(&p, b"x").unwrap();
        remove_best_effort(&p);
        assert!(!p.exists());
        remove_best_effort(&p);
    }

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = {
            let f = ScratchFile::create(dir.path(), "input-", ".pdf").unwrap();
            assert!(f.path().exists());
            let name = f.path().file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("input-") && name.ends_with(".pdf"));
            f.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn scratch_names_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = ScratchFile::create(dir.path(), "x-", ".pdf").unwrap();
        let b = ScratchFile::create(dir.path(), "x-", ".pdf").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn adopted_file_already_deleted_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("gone.jpg");
        drop(ScratchFile::adopt(&p));
    }

    #[tokio::test]
    async fn write_fills_file() {
        let dir = TempDir::new().unwrap();
        let f = ScratchFile::write(dir.path(), "dl-", ".pdf", b"%PDF-1.7")
            .await
            .unwrap();
        assert_eq!(std::fs::read(f.path()).unwrap(), b"%PDF-1.7");
    }
}
