//! Spinners for the flake queries.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with `msg`.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner that draws nothing, for quiet runs.
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}

/// Finish a spinner with a success line.
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain());
    pb.finish_with_message(format!("{} {}", "✓".green(), msg));
}

/// Finish a spinner with an error line.
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain());
    pb.finish_with_message(format!("{} {}", "✗".red(), msg));
}

fn plain() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}
