//! Scoped lock file rollback.
//!
//! A [`PendingUpdate`] marks the window in which the lock file may differ
//! from its committed state. Releasing it restores the lock file; dropping it
//! without release (early return, panic) restores it too, so the repository
//! is left as it was found on every exit path.

use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Restore `lock_file` in `repo` to its committed state.
pub fn revert(backend: &dyn Backend, repo: &Path, lock_file: &Path) -> Result<()> {
    log::info!("Restoring {}", lock_file.display());
    backend
        .restore(repo, lock_file)
        .map_err(|e| Error::Revert {
            lock_file: lock_file.to_path_buf(),
            message: e.to_string(),
        })
}

/// Guard that reverts the lock file exactly once.
pub struct PendingUpdate<'a> {
    backend: &'a dyn Backend,
    repo: PathBuf,
    lock_file: PathBuf,
    released: bool,
}

impl<'a> PendingUpdate<'a> {
    /// Start a window in which the lock file may be modified.
    pub fn acquire(backend: &'a dyn Backend, repo: &Path, lock_file: &Path) -> Self {
        log::debug!(
            "Lock file {} may change until released",
            repo.join(lock_file).display()
        );
        Self {
            backend,
            repo: repo.to_path_buf(),
            lock_file: lock_file.to_path_buf(),
            released: false,
        }
    }

    /// Restore the lock file and report whether that worked.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        revert(self.backend, &self.repo, &self.lock_file)
    }
}

impl Drop for PendingUpdate<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = revert(self.backend, &self.repo, &self.lock_file) {
            log::error!("{e}");
        }
    }
}
