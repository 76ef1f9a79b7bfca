//! Full update preview: build, update, rebuild, diff, restore.

use anyhow::{Context, Result};
use chrono::Local;
use flakekit::{Orchestrator, ReportMode, RunContext};

use super::Setup;
use crate::cli::Cli;
use crate::{Context as AppContext, paths, ui};

pub fn run(ctx: &AppContext, cli: &Cli) -> Result<()> {
    let setup = Setup::load(cli)?;
    let options = &setup.options;
    let started = Local::now();

    setup.print_header(ctx, "Flake update preview");
    if !ctx.quiet {
        ui::kv("Input", &options.input);
        if !options.update_inputs.is_empty() {
            ui::kv("Updating", &ui::list(&options.update_inputs));
        }
        ui::kv("Reports", &paths::display(&options.output_dir));
        println!();
    }

    let echo_reports = options.report_mode == ReportMode::PerHost;
    let mut observer = setup.observer(ctx, echo_reports);
    let result = Orchestrator::new(&setup.backend, options, &mut observer).run(&cli.hosts);
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            observer.abort();
            return Err(e).context("Update preview failed");
        }
    };

    summarize(ctx, options.report_mode, &run);

    if !ctx.quiet {
        let elapsed = (Local::now() - started).num_seconds();
        println!();
        ui::success(&format!("Done in {}", ui::format_elapsed(elapsed)));
    }
    Ok(())
}

fn summarize(ctx: &AppContext, mode: ReportMode, run: &RunContext) {
    let failed: Vec<String> = run.diffs.failures().map(|(host, _)| host.to_string()).collect();
    if !failed.is_empty() {
        println!();
        ui::warn(&format!("Diff failed for: {}", ui::list(&failed)));
    }

    if ctx.quiet {
        return;
    }

    if mode == ReportMode::FlatOnly
        && let Some(aggregate) = &run.aggregate
    {
        println!();
        println!("{}", aggregate.render());
    }

    if !run.written.is_empty() {
        ui::section("Reports written");
        for path in &run.written {
            ui::dim(&paths::display(path));
        }
    }
}
