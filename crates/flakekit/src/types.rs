//! Core types for the build/update/diff cycle.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Width of the separator rule used in reports.
pub const RULE_WIDTH: usize = 76;

/// Separator rule placed below report headers.
pub fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// File name component for a host, with path separators replaced by `_`.
///
/// Host names come from flake attribute names, which may contain any character.
pub fn file_name(host: &str) -> String {
    host.replace(['/', '\\'], "_")
}

/// Revision of a locked flake input, identified by its `lastModified` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PinState {
    /// Seconds since the Unix epoch
    pub last_modified: i64,
}

impl PinState {
    /// Create a pin state from a Unix timestamp.
    pub fn new(last_modified: i64) -> Self {
        Self { last_modified }
    }

    /// Render the revision as `YYYY-MM-DD HH:MM:SS` in the given timezone.
    pub fn format_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match DateTime::<Utc>::from_timestamp(self.last_modified, 0) {
            Some(utc) => utc
                .with_timezone(tz)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => self.last_modified.to_string(),
        }
    }
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_in(&Local))
    }
}

/// Host configurations a flake exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCatalog {
    hosts: BTreeSet<String>,
}

impl HostCatalog {
    /// Build a catalog from host names.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the flake defines a configuration with this name.
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Host names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    /// Number of hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the flake exposes no hosts at all.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Which side of the update a build belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    /// Single build at the current revision (build-only mode)
    Current,
    /// Build before the lock file is updated
    Pre,
    /// Build after the lock file is updated
    Post,
}

impl BuildPhase {
    /// Phase name as used in out-link names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }

    /// Out-link name for a host built in this phase.
    ///
    /// `result-<host>` for single builds, `result-<phase>-<host>` otherwise.
    pub fn out_link(&self, host: &str) -> String {
        match self {
            Self::Current => format!("result-{}", file_name(host)),
            Self::Pre | Self::Post => format!("result-{}-{}", self.name(), file_name(host)),
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Output link created by building one host in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Host that was built
    pub host: String,
    /// Phase of the build
    pub phase: BuildPhase,
    /// Out-link path inside the repository
    pub link: PathBuf,
    /// Store paths reported by the build
    pub out_paths: Vec<PathBuf>,
}

/// Closure differences of one host between its pre and post builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffRecord {
    lines: Vec<String>,
}

impl DiffRecord {
    /// Build a record from already-split lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Split diff output into lines, dropping empty ones.
    pub fn from_output(output: &str) -> Self {
        Self {
            lines: output
                .lines()
                .filter(|l| !l.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Diff lines in the order the diff tool printed them.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether the closures were identical.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Result of diffing one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Diff succeeded (possibly with no changes)
    Changed(DiffRecord),
    /// Diff command failed; the message is shown in place of a body
    Failed(String),
}

impl DiffOutcome {
    /// The diff record, if the diff succeeded.
    pub fn record(&self) -> Option<&DiffRecord> {
        match self {
            Self::Changed(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    /// Whether the diff command failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-host diff outcomes, keyed by host in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    entries: Vec<(String, DiffOutcome)>,
}

impl DiffReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a host, replacing any earlier one in place.
    pub fn insert(&mut self, host: impl Into<String>, outcome: DiffOutcome) {
        let host = host.into();
        if let Some(entry) = self.entries.iter_mut().find(|(h, _)| *h == host) {
            entry.1 = outcome;
        } else {
            self.entries.push((host, outcome));
        }
    }

    /// Outcome for a host.
    pub fn get(&self, host: &str) -> Option<&DiffOutcome> {
        self.entries
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, outcome)| outcome)
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiffOutcome)> {
        self.entries.iter().map(|(h, o)| (h.as_str(), o))
    }

    /// Successful records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &DiffRecord)> {
        self.iter()
            .filter_map(|(host, outcome)| outcome.record().map(|r| (host, r)))
    }

    /// Hosts whose diff failed, with the failure message.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(host, outcome)| match outcome {
            DiffOutcome::Failed(message) => Some((host, message.as_str())),
            DiffOutcome::Changed(_) => None,
        })
    }

    /// Number of hosts in the report.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no host has been diffed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deduplicated, sorted union of every host's diff lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDiff {
    /// Revision transition line
    pub header: String,
    /// Unique diff lines, ascending
    pub lines: Vec<String>,
}

impl AggregateDiff {
    /// Render header, rule and body as report text.
    pub fn render(&self) -> String {
        let mut out = Vec::with_capacity(self.lines.len() + 2);
        out.push(self.header.clone());
        out.push(rule());
        out.extend(self.lines.iter().cloned());
        out.join("\n")
    }
}

/// Which report files to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    /// Per-host text files, the JSON record and the aggregate file
    #[default]
    PerHost,
    /// Only the aggregate file
    FlatOnly,
}

/// Position of a run in the update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CycleState {
    /// Revision and host catalog are known
    Discovered,
    /// Requested hosts have been filtered
    Validated,
    /// Every valid host is built at the current revision
    PreBuilt,
    /// The lock file has been updated
    Updated,
    /// Every valid host is built at the new revision
    PostBuilt,
    /// Closures have been diffed and reports written
    Diffed,
    /// The lock file has been restored
    Reverted,
    /// Run finished
    Done,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovered => "discovered",
            Self::Validated => "validated",
            Self::PreBuilt => "pre-built",
            Self::Updated => "updated",
            Self::PostBuilt => "post-built",
            Self::Diffed => "diffed",
            Self::Reverted => "reverted",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}
