pub mod build;
pub mod preview;

use anyhow::{Context, Result};
use flakekit::CycleOptions;
use flakekit::backend::nix::NixBackend;

use crate::cli::Cli;
use crate::config::Config;
use crate::console::ConsoleObserver;
use crate::{Context as AppContext, paths, ui};

/// Everything a command needs to drive a run.
struct Setup {
    options: CycleOptions,
    backend: NixBackend,
}

impl Setup {
    fn load(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let options = config.cycle_options(cli)?;

        let mut backend = NixBackend::with_tools(config.nix(), config.git())
            .context("Cannot query the flake")?;
        if let Some(subcommand) = &config.info_subcommand {
            backend = backend.info_subcommand(subcommand.clone());
        }

        Ok(Self { options, backend })
    }

    fn observer(&self, ctx: &AppContext, echo_reports: bool) -> ConsoleObserver {
        let mut observer = ConsoleObserver::new(
            ctx,
            &self.options.input,
            self.options.lock_file.clone(),
            echo_reports,
        );
        observer.start_discovery(&self.options.repo);
        observer
    }

    fn print_header(&self, ctx: &AppContext, title: &str) {
        if ctx.quiet {
            return;
        }
        ui::header(title);
        ui::kv("Flake", &paths::display(&self.options.repo));
        ui::kv("Hosts attribute", &self.options.configurations);
    }
}
