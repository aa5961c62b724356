//! Host-wide run lock preventing overlapping decision cycles.
//!
//! The scheduler and the interface-change watcher may both trigger an
//! invocation at the same moment. The lock is advisory, tied to one
//! well-known file, and acquired without blocking: a second invocation
//! that finds it held must skip its whole cycle rather than queue a
//! duplicate login attempt.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// Errors from run-lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another invocation currently holds the lock. Non-fatal: the caller
    /// skips this decision cycle.
    #[error("run lock at {path} is held by another invocation")]
    Contended {
        /// The lock file path.
        path: PathBuf,
    },

    /// The lock file could not be created or locked for reasons other than
    /// contention. Fatal setup failure.
    #[error("failed to set up run lock at {path}: {source}")]
    Io {
        /// The lock file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Whether this error is routine contention rather than a setup failure.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contended { .. })
    }
}

/// An exclusively held run lock. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Attempts a non-blocking exclusive acquisition of the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Contended`] when another process holds the lock
    /// and [`LockError::Io`] when the file cannot be created or locked.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "run lock acquired");
                Ok(Self { file, path })
            }
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::Contended { path })
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(error) = fs2::FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), %error, "run lock unlock failed");
        } else {
            debug!(path = %self.path.display(), "run lock released");
        }
    }
}
