//! Backend abstraction for the external build and VCS tools.
//!
//! The [`Backend`] trait has one method per external invocation the update
//! cycle needs. Implementations only run commands and hand back their raw
//! output; interpreting that output is the job of the cycle modules.

pub mod nix;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::{CommandResult, Result};
use std::path::{Path, PathBuf};

/// Backend trait for flake operations.
///
/// This trait abstracts the underlying tooling, enabling:
/// - Real CLI execution via `nix` and `git`
/// - Mock implementations for testing
pub trait Backend: Send + Sync {
    /// Locked input metadata of the flake at `repo`, as JSON text.
    fn flake_info(&self, repo: &Path) -> CommandResult<String>;

    /// Output listing of the flake at `repo`, as JSON text.
    fn flake_show(&self, repo: &Path) -> CommandResult<String>;

    /// Build `installable` and point `out_link` (relative to `repo`) at it.
    ///
    /// Returns the store paths the build produced.
    fn build(&self, repo: &Path, installable: &str, out_link: &str)
    -> CommandResult<Vec<PathBuf>>;

    /// Update the lock file. An empty `inputs` slice updates every input.
    fn update(&self, repo: &Path, inputs: &[String]) -> CommandResult<()>;

    /// Human-readable closure differences between two out-links.
    fn diff_closures(&self, repo: &Path, before: &str, after: &str) -> CommandResult<String>;

    /// Restore `lock_file` to its committed state.
    fn restore(&self, repo: &Path, lock_file: &Path) -> CommandResult<()>;
}

/// Get the default backend (real `nix` and `git` CLIs).
pub fn default_backend() -> Result<nix::NixBackend> {
    nix::NixBackend::new()
}
