mod cli;
mod commands;
mod config;
mod console;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if cli.build_only {
        commands::build::run(&ctx, &cli)
    } else {
        commands::preview::run(&ctx, &cli)
    }
}
