//! Single build of each host at the locked revision.

use anyhow::{Context, Result};
use flakekit::Orchestrator;

use super::Setup;
use crate::cli::Cli;
use crate::{Context as AppContext, paths, ui};

pub fn run(ctx: &AppContext, cli: &Cli) -> Result<()> {
    let setup = Setup::load(cli)?;
    setup.print_header(ctx, "Flake build");
    if !ctx.quiet {
        println!();
    }

    let mut observer = setup.observer(ctx, false);
    let result =
        Orchestrator::new(&setup.backend, &setup.options, &mut observer).build_only(&cli.hosts);
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            observer.abort();
            return Err(e).context("Build failed");
        }
    };

    if !ctx.quiet && !run.artifacts.is_empty() {
        ui::section("Results");
        for artifact in &run.artifacts {
            ui::kv(&artifact.host, &paths::display(&artifact.link));
        }
    }
    Ok(())
}
