//! Real backend using the `nix` and `git` command line tools.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::backend::Backend;
use crate::error::{CommandError, CommandResult, Error, Result};

/// Backend that executes real `nix` and `git` commands.
///
/// Every command runs with the flake repository as working directory, so
/// out-links and the lock file path are resolved relative to it.
pub struct NixBackend {
    nix_path: String,
    git_path: String,
    info_subcommand: String,
}

impl NixBackend {
    /// Create a backend using `nix` and `git` from `PATH`.
    ///
    /// Returns an error if `nix` cannot be found.
    pub fn new() -> Result<Self> {
        Self::with_tools("nix", "git")
    }

    /// Create a backend with explicit executables.
    pub fn with_tools(nix: impl Into<String>, git: impl Into<String>) -> Result<Self> {
        let nix_path = nix.into();
        if !Self::is_available(&nix_path) {
            return Err(Error::ToolNotFound(nix_path));
        }
        Ok(Self {
            nix_path,
            git_path: git.into(),
            info_subcommand: "metadata".to_string(),
        })
    }

    /// Use a different `nix flake` subcommand for the metadata query.
    ///
    /// Older nix releases only know `info`.
    pub fn info_subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.info_subcommand = subcommand.into();
        self
    }

    /// Check if an executable can be found.
    pub fn is_available(program: &str) -> bool {
        if Path::new(program).is_absolute() {
            return Path::new(program).exists();
        }
        Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, program: &str, repo: &Path, args: &[&str]) -> (Command, String) {
        let display = format!("{} {}", program, args.join(" "));
        log::debug!("Running in {}: {}", repo.display(), display);
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(repo);
        (cmd, display)
    }

    /// Run a command capturing stdout and stderr.
    fn run_captured(&self, program: &str, repo: &Path, args: &[&str]) -> CommandResult<String> {
        let (mut cmd, display) = self.command(program, repo, args);
        let output = cmd
            .output()
            .map_err(|e| CommandError::spawn(display.clone(), &e))?;
        check_output(&display, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command capturing stdout while stderr stays on the terminal.
    fn run_streamed(&self, program: &str, repo: &Path, args: &[&str]) -> CommandResult<String> {
        let (mut cmd, display) = self.command(program, repo, args);
        let output = cmd
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| CommandError::spawn(display.clone(), &e))?;
        check_output(&display, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn check_output(display: &str, output: &Output) -> CommandResult<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(CommandError::failed(
            display,
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

/// Parse `--print-out-paths` output into store paths.
fn parse_out_paths(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl Backend for NixBackend {
    fn flake_info(&self, repo: &Path) -> CommandResult<String> {
        self.run_captured(
            &self.nix_path,
            repo,
            &["flake", self.info_subcommand.as_str(), "--json"],
        )
    }

    fn flake_show(&self, repo: &Path) -> CommandResult<String> {
        self.run_captured(&self.nix_path, repo, &["flake", "show", "--json"])
    }

    fn build(
        &self,
        repo: &Path,
        installable: &str,
        out_link: &str,
    ) -> CommandResult<Vec<PathBuf>> {
        let stdout = self.run_streamed(
            &self.nix_path,
            repo,
            &[
                "build",
                "--print-out-paths",
                installable,
                "--out-link",
                out_link,
            ],
        )?;
        Ok(parse_out_paths(&stdout))
    }

    fn update(&self, repo: &Path, inputs: &[String]) -> CommandResult<()> {
        let mut args = vec!["flake", "update"];
        args.extend(inputs.iter().map(String::as_str));
        self.run_streamed(&self.nix_path, repo, &args)?;
        Ok(())
    }

    fn diff_closures(&self, repo: &Path, before: &str, after: &str) -> CommandResult<String> {
        let before = format!("./{before}");
        let after = format!("./{after}");
        self.run_captured(
            &self.nix_path,
            repo,
            &["store", "diff-closures", before.as_str(), after.as_str()],
        )
    }

    fn restore(&self, repo: &Path, lock_file: &Path) -> CommandResult<()> {
        let lock_file = lock_file.to_string_lossy();
        self.run_captured(&self.git_path, repo, &["restore", lock_file.as_ref()])?;
        Ok(())
    }
}
