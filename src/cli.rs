use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sonar-harness",
    version,
    about = "Integration test harness for code-analysis server plugins"
)]
pub struct Cli {
    /// Increase verbosity (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan an analysis log for error and warning lines
    CheckLog(CheckLogCommand),
    /// Scan today's server log for error and warning lines
    ServerLog(ServerLogCommand),
    /// Wait for the background task named in an analysis log
    Wait(WaitCommand),
    /// Compare a project's measures with expected values
    Measures(MeasuresCommand),
    /// Run a scenario file
    Run(RunCommand),
    /// Delete the server's log files
    CleanupLogs(ServerHomeArgs),
    /// Print the server's log files
    DumpLogs(ServerHomeArgs),
}

#[derive(Clone, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct ServerHomeArgs {
    /// Server installation directory; defaults to $SONARHOME
    #[arg(long)]
    pub home: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckLogCommand {
    pub log: PathBuf,
    /// File with one regex per line; matching lines are not reported
    #[arg(long)]
    pub ignore_file: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct ServerLogCommand {
    #[command(flatten)]
    pub server: ServerHomeArgs,
    #[arg(long)]
    pub ignore_file: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct WaitCommand {
    pub log: PathBuf,
    /// Directory holding sonar-harness.toml
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct MeasuresCommand {
    pub project: String,
    /// Expected measure as metric=value; use "None" for no value
    #[arg(long = "expect", value_name = "METRIC=VALUE")]
    pub expect: Vec<String>,
    /// tests, failures, errors, skipped, success density, execution time
    #[arg(long)]
    pub test_metrics: Option<String>,
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct RunCommand {
    pub scenario: PathBuf,
    #[command(flatten)]
    pub server: ServerHomeArgs,
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}
