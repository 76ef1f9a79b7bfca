use clap::{Parser, ValueEnum};
use flakekit::ReportMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flakediff")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Preview what a flake update changes: build hosts before and after, diff their closures",
    long_about = None
)]
pub struct Cli {
    /// Hosts to build (names under the configurations attribute)
    #[arg(required = true, num_args = 1..)]
    pub hosts: Vec<String>,

    /// Path to the flake repository [default: current directory]
    #[arg(short = 'f', long, env = "FLAKEDIFF_REPO", alias = "flake_repo")]
    pub flake_repo: Option<String>,

    /// Directory receiving the reports [default: diff_lists]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Locked input named in the revision header [default: nixpkgs]
    #[arg(long)]
    pub input: Option<String>,

    /// Only update this input (repeatable; all inputs when omitted)
    #[arg(long = "update-input", value_name = "INPUT")]
    pub update_inputs: Vec<String>,

    /// Flake attribute holding the host configurations [default: nixosConfigurations]
    #[arg(long)]
    pub attr: Option<String>,

    /// Which report files to write [default: per-host]
    #[arg(long, value_enum)]
    pub report: Option<ReportArg>,

    /// Build each host once at the current revision, without updating
    #[arg(long)]
    pub build_only: bool,

    /// Config file to read instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportArg {
    /// Per-host files, the JSON record and the aggregate
    PerHost,
    /// Only the aggregate report
    FlatOnly,
}

impl From<ReportArg> for ReportMode {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::PerHost => ReportMode::PerHost,
            ReportArg::FlatOnly => ReportMode::FlatOnly,
        }
    }
}
