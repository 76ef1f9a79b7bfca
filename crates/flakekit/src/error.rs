//! Error types for flake preview operations.
//!
//! Errors follow the phases of the update cycle. Discovery, build, update and
//! revert failures abort the cycle; diff failures are per host and are
//! recorded in the report instead of being propagated.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::BuildPhase;

/// The flake query that produced a discovery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Locked input metadata (`nix flake metadata --json`)
    Info,
    /// Flake outputs (`nix flake show --json`)
    Show,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "metadata"),
            Self::Show => write!(f, "outputs"),
        }
    }
}

/// An external command that could not be spawned or exited non-zero.
#[derive(Debug, Clone, Error)]
#[error("`{command}` {}{}", status_text(.status), stderr_suffix(.stderr))]
pub struct CommandError {
    /// Command line that was executed
    pub command: String,
    /// Exit code, `None` when the process could not be spawned or was killed
    pub status: Option<i32>,
    /// Captured standard error (empty when stderr was inherited)
    pub stderr: String,
}

impl CommandError {
    /// Create an error for a command that exited unsuccessfully.
    pub fn failed(command: impl Into<String>, status: Option<i32>, stderr: &str) -> Self {
        Self {
            command: command.into(),
            status,
            stderr: stderr.trim().to_string(),
        }
    }

    /// Create an error for a command that could not be started at all.
    pub fn spawn(command: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            command: command.into(),
            status: None,
            stderr: format!("failed to execute: {err}"),
        }
    }
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {code}"),
        None => "did not complete".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result type for external command invocations.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors that can occur while previewing a flake update.
#[derive(Debug, Error)]
pub enum Error {
    /// Querying the flake failed or returned unusable output
    #[error("failed to read flake {query}: {message}")]
    Discovery {
        /// Which query failed
        query: Query,
        /// What went wrong
        message: String,
    },

    /// Building a host configuration failed
    #[error("failed to build host '{host}' ({phase}): {source}")]
    Build {
        /// Host that failed to build
        host: String,
        /// Phase the build belonged to
        phase: BuildPhase,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// Updating the lock file failed
    #[error("failed to update flake inputs: {0}")]
    Update(String),

    /// Diffing the closures of one host failed
    #[error("failed to diff closures for host '{host}': {message}")]
    Diff {
        /// Host whose diff failed
        host: String,
        /// What went wrong
        message: String,
    },

    /// Restoring the lock file failed
    #[error("failed to restore {}: {message}", .lock_file.display())]
    Revert {
        /// Lock file that could not be restored
        lock_file: PathBuf,
        /// What went wrong
        message: String,
    },

    /// A required executable is missing
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a discovery error.
    pub fn discovery(query: Query, message: impl Into<String>) -> Self {
        Error::Discovery {
            query,
            message: message.into(),
        }
    }

    /// Short name of the phase this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Discovery { .. } | Error::ToolNotFound(_) => "discovery",
            Error::Build { .. } => "build",
            Error::Update(_) => "update",
            Error::Diff { .. } => "diff",
            Error::Revert { .. } => "revert",
            Error::Io(_) | Error::Json(_) => "report",
        }
    }

    /// Whether this error aborts the whole cycle.
    ///
    /// Diff failures only affect their own host.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Diff { .. })
    }
}

/// Result type for flake preview operations.
pub type Result<T> = std::result::Result<T, Error>;
