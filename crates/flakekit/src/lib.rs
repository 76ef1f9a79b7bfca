//! # flakekit
//!
//! Preview what a flake input update would change on a set of hosts.
//!
//! A run builds every requested host configuration at the currently locked
//! revision, updates the lock file, builds the hosts again, diffs the two
//! closures of each host and writes the differences to report files. The
//! lock file is restored afterwards, on success and on failure alike, so the
//! repository is left exactly as it was.
//!
//! ## Example
//!
//! ```no_run
//! use flakekit::{CycleOptions, Orchestrator, Silent};
//!
//! let backend = flakekit::backend::default_backend().expect("nix not available");
//! let options = CycleOptions::new("/etc/nixos");
//!
//! let run = Orchestrator::new(&backend, &options, &mut Silent)
//!     .run(&["laptop", "server"])
//!     .expect("update preview failed");
//!
//! for (host, record) in run.diffs.records() {
//!     println!("{host}: {} change(s)", record.lines().len());
//! }
//! ```
//!
//! ## Failure handling
//!
//! - Discovery, build and update failures stop the run.
//! - A failed closure diff only affects its host; the report carries a
//!   failure marker instead of diff lines.
//! - The lock file is reverted exactly once on every path past validation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod report;
pub mod rollback;
pub mod types;
pub mod validate;

pub use backend::Backend;
pub use cycle::{CycleObserver, CycleOptions, Orchestrator, RunContext, Silent};
pub use error::{CommandError, Error, Query, Result};
pub use types::{
    AggregateDiff, BuildArtifact, BuildPhase, CycleState, DiffOutcome, DiffRecord, DiffReport,
    HostCatalog, PinState, ReportMode,
};
pub use validate::Validation;
