//! Terminal rendering of cycle progress.

use flakekit::report::revision_header;
use flakekit::types::{BuildArtifact, BuildPhase, CycleState, HostCatalog, PinState};
use flakekit::{CycleObserver, Error};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

use crate::{Context, paths, progress, ui};

/// Prints cycle events as they happen.
pub struct ConsoleObserver {
    quiet: bool,
    verbose: bool,
    input: String,
    lock_file: PathBuf,
    spinner: Option<ProgressBar>,
    hosts: usize,
    phase: Option<BuildPhase>,
    built: usize,
    echo_reports: bool,
}

impl ConsoleObserver {
    /// Observer for a run reading `input`'s revision and restoring `lock_file`.
    pub fn new(ctx: &Context, input: &str, lock_file: PathBuf, echo_reports: bool) -> Self {
        Self {
            quiet: ctx.quiet,
            verbose: ctx.verbose > 0,
            input: input.to_string(),
            lock_file,
            spinner: None,
            hosts: 0,
            phase: None,
            built: 0,
            echo_reports,
        }
    }

    /// Show a spinner until the flake has been queried.
    pub fn start_discovery(&mut self, repo: &Path) {
        let msg = format!("Reading flake at {}...", paths::display(repo));
        self.spinner = Some(if self.quiet {
            progress::hidden()
        } else {
            progress::spinner(&msg)
        });
    }

    /// Close the discovery spinner if the run failed before it finished.
    pub fn abort(&mut self) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_error(&pb, "Could not read flake");
        }
    }
}

impl CycleObserver for ConsoleObserver {
    fn on_state(&mut self, state: CycleState) {
        if state == CycleState::Discovered
            && let Some(pb) = self.spinner.take()
        {
            progress::finish_success(&pb, "Read flake");
        }
    }

    fn on_hosts_rejected(&mut self, rejected: &[String], catalog: &HostCatalog) {
        ui::warn(&format!(
            "Not found in flake, skipping: {}",
            ui::list(rejected)
        ));
        let available: Vec<String> = catalog.names().map(ToString::to_string).collect();
        ui::dim(&format!("Available hosts: {}", ui::list(&available)));
    }

    fn on_hosts_validated(&mut self, valid: &[String]) {
        self.hosts = valid.len();
        if valid.is_empty() {
            ui::warn("No valid hosts to build");
        } else if !self.quiet {
            ui::info(&format!("Hosts: {}", ui::list(valid)));
        }
    }

    fn on_build_start(&mut self, host: &str, phase: BuildPhase) {
        if self.phase != Some(phase) {
            self.phase = Some(phase);
            self.built = 0;
            if !self.quiet {
                match phase {
                    BuildPhase::Current => ui::section("Building"),
                    BuildPhase::Pre => ui::section("Building before update"),
                    BuildPhase::Post => ui::section("Building after update"),
                }
            }
        }
        self.built += 1;
        if !self.quiet {
            ui::step(self.built, self.hosts, &format!("Building {host}"));
        }
    }

    fn on_build_complete(&mut self, artifact: &BuildArtifact) {
        if self.verbose {
            for path in &artifact.out_paths {
                ui::dim(&path.display().to_string());
            }
        }
    }

    fn on_update_start(&mut self) {
        if !self.quiet {
            ui::section("Updating flake inputs");
        }
    }

    fn on_updated(&mut self, before: PinState, after: PinState) {
        if !self.quiet {
            ui::info(&revision_header(&self.input, before, after));
        }
    }

    fn on_diff_start(&mut self, host: &str) {
        log::debug!("Diffing closures of {host}");
    }

    fn on_diff_failed(&mut self, host: &str, error: &Error) {
        ui::error(&format!("Diff failed for {host}: {error}"));
    }

    fn on_host_report(&mut self, _host: &str, text: &str) {
        if self.echo_reports && !self.quiet {
            println!();
            println!("{text}");
        }
    }

    fn on_reverted(&mut self, error: Option<&Error>) {
        match error {
            None if !self.quiet => {
                println!();
                ui::success(&format!("Restored {}", self.lock_file.display()));
            }
            None => {}
            Some(e) => ui::error(&e.to_string()),
        }
    }
}
