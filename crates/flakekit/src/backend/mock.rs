//! Recording backend for tests.
//!
//! Simulates a flake whose lock file lives on disk: `update` rewrites it and
//! `restore` puts the committed content back, so tests can check the file.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Backend;
use crate::error::{CommandError, CommandResult};

pub const BEFORE: i64 = 1_700_000_000;
pub const AFTER: i64 = 1_710_000_000;
pub const COMMITTED_LOCK: &str = "{\"version\": 7, \"rev\": \"old\"}\n";
pub const UPDATED_LOCK: &str = "{\"version\": 7, \"rev\": \"new\"}\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Info,
    Show,
    Build { installable: String, out_link: String },
    Update(Vec<String>),
    Diff { before: String, after: String },
    Restore(PathBuf),
}

pub struct MockBackend {
    hosts: Vec<String>,
    pub calls: Mutex<Vec<Call>>,
    updated: Mutex<bool>,
    pub fail_info: bool,
    pub fail_info_when_updated: bool,
    pub fail_show: bool,
    pub fail_build: Option<String>,
    pub fail_update: bool,
    pub fail_restore: bool,
    pub fail_diff: BTreeSet<String>,
    pub show_output: Option<String>,
}

fn default_diff(before: &str) -> String {
    let host = before.trim_start_matches("result-pre-");
    format!("shared 1.0 -> 1.1\n{host}-only 0.1 -> 0.2\n\n")
}

impl MockBackend {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            hosts: hosts.iter().map(ToString::to_string).collect(),
            calls: Mutex::new(Vec::new()),
            updated: Mutex::new(false),
            fail_info: false,
            fail_info_when_updated: false,
            fail_show: false,
            fail_build: None,
            fail_update: false,
            fail_restore: false,
            fail_diff: BTreeSet::new(),
            show_output: None,
        }
    }

    /// Write the committed lock file into `repo`.
    pub fn seed_lock(repo: &Path) {
        fs::write(repo.join("flake.lock"), COMMITTED_LOCK).unwrap();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn restore_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Restore(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail(command: &str) -> CommandError {
        CommandError::failed(command, Some(1), "simulated failure")
    }
}

impl Backend for MockBackend {
    fn flake_info(&self, _repo: &Path) -> CommandResult<String> {
        self.record(Call::Info);
        let updated = *self.updated.lock().unwrap();
        if self.fail_info || (updated && self.fail_info_when_updated) {
            return Err(Self::fail("nix flake metadata"));
        }
        let last_modified = if updated { AFTER } else { BEFORE };
        Ok(format!(
            r#"{{"locks": {{"nodes": {{"nixpkgs": {{"locked": {{"lastModified": {last_modified}}}}}}}}}}}"#
        ))
    }

    fn flake_show(&self, _repo: &Path) -> CommandResult<String> {
        self.record(Call::Show);
        if self.fail_show {
            return Err(Self::fail("nix flake show"));
        }
        if let Some(output) = &self.show_output {
            return Ok(output.clone());
        }
        let hosts: Vec<String> = self
            .hosts
            .iter()
            .map(|h| format!(r#""{h}": {{"type": "nixos-configuration"}}"#))
            .collect();
        Ok(format!(
            r#"{{"nixosConfigurations": {{{}}}}}"#,
            hosts.join(", ")
        ))
    }

    fn build(
        &self,
        _repo: &Path,
        installable: &str,
        out_link: &str,
    ) -> CommandResult<Vec<PathBuf>> {
        self.record(Call::Build {
            installable: installable.to_string(),
            out_link: out_link.to_string(),
        });
        if self.fail_build.as_deref() == Some(out_link) {
            return Err(Self::fail("nix build"));
        }
        Ok(vec![PathBuf::from(format!("/nix/store/mock-{out_link}"))])
    }

    fn update(&self, repo: &Path, inputs: &[String]) -> CommandResult<()> {
        self.record(Call::Update(inputs.to_vec()));
        if self.fail_update {
            return Err(Self::fail("nix flake update"));
        }
        let lock = repo.join("flake.lock");
        if lock.exists() {
            fs::write(&lock, UPDATED_LOCK).map_err(|e| CommandError::spawn("write", &e))?;
        }
        *self.updated.lock().unwrap() = true;
        Ok(())
    }

    fn diff_closures(&self, _repo: &Path, before: &str, after: &str) -> CommandResult<String> {
        self.record(Call::Diff {
            before: before.to_string(),
            after: after.to_string(),
        });
        let host = before.trim_start_matches("result-pre-");
        if self.fail_diff.contains(host) {
            return Err(Self::fail("nix store diff-closures"));
        }
        Ok(default_diff(before))
    }

    fn restore(&self, repo: &Path, lock_file: &Path) -> CommandResult<()> {
        self.record(Call::Restore(lock_file.to_path_buf()));
        if self.fail_restore {
            return Err(Self::fail("git restore"));
        }
        let lock = repo.join(lock_file);
        if lock.exists() {
            fs::write(&lock, COMMITTED_LOCK).map_err(|e| CommandError::spawn("write", &e))?;
        }
        *self.updated.lock().unwrap() = false;
        Ok(())
    }
}
