//! Path resolution for flakediff
//!
//! # Environment Variables
//!
//! - `FLAKEDIFF_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/flakediff`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `FLAKEDIFF_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/flakediff` (if set)
//! 3. `~/.config/flakediff`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "FLAKEDIFF_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the flakediff config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(|key| std::env::var(key).ok(), dirs::home_dir())
}

/// Get the path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

fn resolve_config_dir(
    var: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Some(xdg_config) = var("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let path = PathBuf::from(xdg_config).join("flakediff");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(".config").join("flakediff");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
///
/// # Examples
///
/// ```ignore
/// let repo = paths::expand("~/nixos-config");
/// let out = paths::expand("$HOME/diffs");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Resolve a flake repository argument, defaulting to the current directory.
pub fn repo_dir(arg: Option<&str>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(expand(path)),
        None => std::env::current_dir().context("Could not determine current directory"),
    }
}

/// Short display form of `path`, with the home directory replaced by `~`.
pub fn display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return Path::new("~").join(rest).display().to_string();
    }
    path.display().to_string()
}

// ============================================================================
// Tests
// ============================================================================
