//! Registry directory layout and locking.
//!
//! ```text
//! <registry_path>/
//! ├─ LOCK           # Advisory lock, one owning process
//! └─ registry.log   # Commit log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "registry.log";

/// An exclusively locked registry directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct RegistryDir {
    path: PathBuf,
    _lock_file: File,
}

impl RegistryDir {
    /// Opens a registry directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - [`CoreError::DirectoryLocked`] if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "registry directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the commit log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directory() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("registry");

        let dir = RegistryDir::open(&path, true).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.log_path(), path.join("registry.log"));
        assert_eq!(dir.path(), path.as_path());
    }

    #[test]
    fn missing_directory_without_create() {
        let tmp = tempdir().unwrap();
        let result = RegistryDir::open(&tmp.path().join("absent"), false);
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn second_open_is_locked() {
        let tmp = tempdir().unwrap();
        let _first = RegistryDir::open(tmp.path(), true).unwrap();
        assert!(matches!(
            RegistryDir::open(tmp.path(), true),
            Err(CoreError::DirectoryLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let tmp = tempdir().unwrap();
        drop(RegistryDir::open(tmp.path(), true).unwrap());
        assert!(RegistryDir::open(tmp.path(), true).is_ok());
    }
}
