//! Optional `config.toml` with defaults for the command-line options.
//!
//! ```toml
//! flake_repo = "~/nixos-config"
//! output = "~/diffs"
//! input = "nixpkgs"
//! update_inputs = ["nixpkgs"]
//! attr = "nixosConfigurations"
//! toplevel = "config.system.build.toplevel"
//! report = "per-host"
//! nix = "/run/current-system/sw/bin/nix"
//! git = "git"
//! info_subcommand = "metadata"
//! ```
//!
//! Command-line values win over file values, which win over built-in defaults.

use anyhow::{Context, Result};
use flakekit::{CycleOptions, ReportMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::paths;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub flake_repo: Option<String>,
    pub output: Option<String>,
    pub input: Option<String>,
    pub update_inputs: Vec<String>,
    pub attr: Option<String>,
    pub toplevel: Option<String>,
    pub lock_file: Option<String>,
    pub report: Option<ReportMode>,
    pub nix: Option<String>,
    pub git: Option<String>,
    pub info_subcommand: Option<String>,
}

impl Config {
    /// Load the config from `explicit`, or from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => {
                let path = paths::config_file()?;
                if path.exists() {
                    Self::parse_file(&path)
                } else {
                    log::debug!("No config file at {}", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config TOML.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Nix executable to run.
    pub fn nix(&self) -> &str {
        self.nix.as_deref().unwrap_or("nix")
    }

    /// Git executable to run.
    pub fn git(&self) -> &str {
        self.git.as_deref().unwrap_or("git")
    }

    /// Merge command-line arguments over this config into cycle options.
    pub fn cycle_options(&self, cli: &Cli) -> Result<CycleOptions> {
        let repo = paths::repo_dir(cli.flake_repo.as_deref().or(self.flake_repo.as_deref()))?;
        let mut options = CycleOptions::new(repo);

        if let Some(input) = cli.input.as_ref().or(self.input.as_ref()) {
            options.input.clone_from(input);
        }
        if let Some(attr) = cli.attr.as_ref().or(self.attr.as_ref()) {
            options.configurations.clone_from(attr);
        }
        if let Some(toplevel) = &self.toplevel {
            options.toplevel.clone_from(toplevel);
        }
        if let Some(lock_file) = &self.lock_file {
            options.lock_file = PathBuf::from(lock_file);
        }
        if let Some(output) = cli.output.as_deref().or(self.output.as_deref()) {
            options.output_dir = paths::expand(output);
        }
        options.update_inputs = if cli.update_inputs.is_empty() {
            self.update_inputs.clone()
        } else {
            cli.update_inputs.clone()
        };
        if let Some(mode) = cli.report.map(ReportMode::from).or(self.report) {
            options.report_mode = mode;
        }

        Ok(options)
    }
}
