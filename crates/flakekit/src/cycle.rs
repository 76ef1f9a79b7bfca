//! The update cycle: build, update, rebuild, diff, report, revert.
//!
//! A run moves through [`CycleState`] strictly in order:
//!
//! ```text
//! Discovered -> Validated -> PreBuilt -> Updated -> PostBuilt -> Diffed -> Reverted -> Done
//! ```
//!
//! Everything between validation and revert happens inside a
//! [`PendingUpdate`] scope, so the lock file is restored whether the cycle
//! finishes or stops at a build, update or report error. Diff failures are
//! recorded per host and never stop the cycle.

use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::discovery;
use crate::error::{Error, Result};
use crate::report::{self, ReportTarget};
use crate::rollback::PendingUpdate;
use crate::types::{
    AggregateDiff, BuildArtifact, BuildPhase, CycleState, DiffOutcome, DiffRecord, DiffReport,
    HostCatalog, PinState, ReportMode,
};
use crate::validate::{self, Validation};

/// Settings for a run.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    /// Flake repository root
    pub repo: PathBuf,
    /// Locked input whose revision is reported
    pub input: String,
    /// Flake output attribute holding the host configurations
    pub configurations: String,
    /// Attribute path below each host that is built
    pub toplevel: String,
    /// Inputs to update (empty = all)
    pub update_inputs: Vec<String>,
    /// Lock file, relative to the repository
    pub lock_file: PathBuf,
    /// Directory receiving the reports
    pub output_dir: PathBuf,
    /// Which report files to write
    pub report_mode: ReportMode,
}

impl CycleOptions {
    /// Default options for the flake at `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            input: "nixpkgs".to_string(),
            configurations: "nixosConfigurations".to_string(),
            toplevel: "config.system.build.toplevel".to_string(),
            update_inputs: Vec::new(),
            lock_file: PathBuf::from("flake.lock"),
            output_dir: PathBuf::from("diff_lists"),
            report_mode: ReportMode::PerHost,
        }
    }

    /// Installable building the system of `host`.
    pub fn installable(&self, host: &str) -> String {
        format!(".#{}.\"{host}\".{}", self.configurations, self.toplevel)
    }
}

/// Receives progress notifications from a run.
///
/// Every method has a no-op default, so implementors only pick what they show.
pub trait CycleObserver {
    /// The run reached a new state
    fn on_state(&mut self, _state: CycleState) {}

    /// Some requested hosts are not defined by the flake
    fn on_hosts_rejected(&mut self, _rejected: &[String], _catalog: &HostCatalog) {}

    /// The hosts that will be processed
    fn on_hosts_validated(&mut self, _valid: &[String]) {}

    /// A build is about to start
    fn on_build_start(&mut self, _host: &str, _phase: BuildPhase) {}

    /// A build finished
    fn on_build_complete(&mut self, _artifact: &BuildArtifact) {}

    /// The lock file update is about to start
    fn on_update_start(&mut self) {}

    /// The lock file was updated
    fn on_updated(&mut self, _before: PinState, _after: PinState) {}

    /// Diffing a host is about to start
    fn on_diff_start(&mut self, _host: &str) {}

    /// Diffing a host failed; the cycle continues
    fn on_diff_failed(&mut self, _host: &str, _error: &Error) {}

    /// A host report was written
    fn on_host_report(&mut self, _host: &str, _text: &str) {}

    /// The lock file was restored, or restoring it failed
    fn on_reverted(&mut self, _error: Option<&Error>) {}
}

/// Observer that ignores every notification.
pub struct Silent;

impl CycleObserver for Silent {}

/// State of one run, filled in phase by phase.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Flake repository root
    pub repo: PathBuf,
    /// Revision before the update
    pub before: PinState,
    /// Revision after the update, once known
    pub after: Option<PinState>,
    /// Hosts the flake defines
    pub catalog: HostCatalog,
    /// Requested hosts split into valid and rejected
    pub validation: Validation,
    /// Build outputs in build order
    pub artifacts: Vec<BuildArtifact>,
    /// Per-host diff outcomes
    pub diffs: DiffReport,
    /// Aggregate of all successful diffs
    pub aggregate: Option<AggregateDiff>,
    /// Report files written
    pub written: Vec<PathBuf>,
    /// Last state reached
    pub state: CycleState,
}

impl RunContext {
    /// Hosts that take part in the cycle.
    pub fn valid_hosts(&self) -> &[String] {
        &self.validation.valid
    }

    /// Artifact built for `host` in `phase`.
    pub fn artifact(&self, host: &str, phase: BuildPhase) -> Option<&BuildArtifact> {
        self.artifacts
            .iter()
            .rev()
            .find(|a| a.host == host && a.phase == phase)
    }
}

/// Drives a run against a backend.
pub struct Orchestrator<'a> {
    backend: &'a dyn Backend,
    options: &'a CycleOptions,
    observer: &'a mut dyn CycleObserver,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator.
    pub fn new(
        backend: &'a dyn Backend,
        options: &'a CycleOptions,
        observer: &'a mut dyn CycleObserver,
    ) -> Self {
        Self {
            backend,
            options,
            observer,
        }
    }

    /// Run the full cycle for `requested` hosts.
    ///
    /// Fails on discovery, build, update, report or revert errors. The lock
    /// file is restored before any error past validation is returned.
    pub fn run<S: AsRef<str>>(&mut self, requested: &[S]) -> Result<RunContext> {
        let mut ctx = self.discover()?;
        self.validate(&mut ctx, requested);

        let guard = PendingUpdate::acquire(self.backend, &ctx.repo, &self.options.lock_file);
        let cycle = self.build_diff_cycle(&mut ctx);
        let reverted = guard.release();
        self.observer.on_reverted(reverted.as_ref().err());

        match (cycle, reverted) {
            (Ok(()), Ok(())) => {
                self.advance(&mut ctx, CycleState::Reverted);
                self.advance(&mut ctx, CycleState::Done);
                Ok(ctx)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(revert_err)) => {
                log::error!("{revert_err}");
                Err(e)
            }
            (Ok(()), Err(revert_err)) => Err(revert_err),
        }
    }

    /// Build every valid host once at the current revision.
    ///
    /// The lock file is never touched, so nothing needs reverting.
    pub fn build_only<S: AsRef<str>>(&mut self, requested: &[S]) -> Result<RunContext> {
        let mut ctx = self.discover()?;
        self.validate(&mut ctx, requested);
        self.build_all(&mut ctx, BuildPhase::Current)?;
        self.advance(&mut ctx, CycleState::Done);
        Ok(ctx)
    }

    fn advance(&mut self, ctx: &mut RunContext, state: CycleState) {
        log::info!("Cycle {} -> {}", ctx.state, state);
        ctx.state = state;
        self.observer.on_state(state);
    }

    fn repo(&self) -> &Path {
        &self.options.repo
    }

    fn discover(&mut self) -> Result<RunContext> {
        let before = discovery::current_revision(self.backend, self.repo(), &self.options.input)?;
        let catalog =
            discovery::list_hosts(self.backend, self.repo(), &self.options.configurations)?;

        let ctx = RunContext {
            repo: self.options.repo.clone(),
            before,
            after: None,
            catalog,
            validation: Validation::default(),
            artifacts: Vec::new(),
            diffs: DiffReport::new(),
            aggregate: None,
            written: Vec::new(),
            state: CycleState::Discovered,
        };
        self.observer.on_state(CycleState::Discovered);
        Ok(ctx)
    }

    fn validate<S: AsRef<str>>(&mut self, ctx: &mut RunContext, requested: &[S]) {
        ctx.validation = validate::filter_valid(requested, &ctx.catalog);
        if !ctx.validation.all_valid() {
            self.observer
                .on_hosts_rejected(&ctx.validation.rejected, &ctx.catalog);
        }
        self.observer.on_hosts_validated(&ctx.validation.valid);
        self.advance(ctx, CycleState::Validated);
    }

    fn build_diff_cycle(&mut self, ctx: &mut RunContext) -> Result<()> {
        self.build_all(ctx, BuildPhase::Pre)?;
        self.advance(ctx, CycleState::PreBuilt);

        self.update(ctx)?;
        self.advance(ctx, CycleState::Updated);

        self.build_all(ctx, BuildPhase::Post)?;
        self.advance(ctx, CycleState::PostBuilt);

        self.diff_all(ctx);
        self.write_reports(ctx)?;
        self.advance(ctx, CycleState::Diffed);
        Ok(())
    }

    fn build_all(&mut self, ctx: &mut RunContext, phase: BuildPhase) -> Result<()> {
        for host in ctx.validation.valid.clone() {
            let artifact = self.build(&host, phase)?;
            ctx.artifacts.push(artifact);
        }
        Ok(())
    }

    fn build(&mut self, host: &str, phase: BuildPhase) -> Result<BuildArtifact> {
        self.observer.on_build_start(host, phase);
        let installable = self.options.installable(host);
        let out_link = phase.out_link(host);
        log::info!("Building {} ({} update) as {}", host, phase, out_link);

        let out_paths = self
            .backend
            .build(self.repo(), &installable, &out_link)
            .map_err(|source| Error::Build {
                host: host.to_string(),
                phase,
                source,
            })?;

        let artifact = BuildArtifact {
            host: host.to_string(),
            phase,
            link: self.repo().join(&out_link),
            out_paths,
        };
        self.observer.on_build_complete(&artifact);
        Ok(artifact)
    }

    fn update(&mut self, ctx: &mut RunContext) -> Result<()> {
        self.observer.on_update_start();
        self.backend
            .update(self.repo(), &self.options.update_inputs)
            .map_err(|e| Error::Update(e.to_string()))?;

        let after = discovery::current_revision(self.backend, self.repo(), &self.options.input)
            .map_err(|e| Error::Update(format!("could not read revision after update: {e}")))?;
        ctx.after = Some(after);
        self.observer.on_updated(ctx.before, after);
        Ok(())
    }

    fn diff_all(&mut self, ctx: &mut RunContext) {
        for host in ctx.validation.valid.clone() {
            let outcome = match self.diff(&host) {
                Ok(record) => DiffOutcome::Changed(record),
                Err(e) => {
                    log::warn!("{e}");
                    self.observer.on_diff_failed(&host, &e);
                    DiffOutcome::Failed(e.to_string())
                }
            };
            ctx.diffs.insert(host, outcome);
        }
    }

    fn diff(&mut self, host: &str) -> Result<DiffRecord> {
        self.observer.on_diff_start(host);
        let output = self
            .backend
            .diff_closures(
                self.repo(),
                &BuildPhase::Pre.out_link(host),
                &BuildPhase::Post.out_link(host),
            )
            .map_err(|e| Error::Diff {
                host: host.to_string(),
                message: e.to_string(),
            })?;
        Ok(DiffRecord::from_output(&output))
    }

    fn write_reports(&mut self, ctx: &mut RunContext) -> Result<()> {
        let after = ctx.after.unwrap_or(ctx.before);
        let header = report::revision_header(&self.options.input, ctx.before, after);
        let aggregate = report::aggregate(&ctx.diffs, header);

        let target = ReportTarget {
            dir: &self.options.output_dir,
            mode: self.options.report_mode,
            before: ctx.before,
            after,
        };
        let observer = &mut *self.observer;
        ctx.written = report::persist(&target, &ctx.diffs, &aggregate, &mut |host, text| {
            observer.on_host_report(host, text);
        })?;
        ctx.aggregate = Some(aggregate);
        Ok(())
    }
}
