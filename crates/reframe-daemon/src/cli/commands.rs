use clap::{Parser, Subcommand};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "reframe")]
#[command(version = BUILD_VERSION)]
#[command(about = "Reframe - Rewriting forward proxy")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "REFRAME_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the proxy")]
    #[command(long_about = "Start the reframe proxy in the foreground.\n\nThe proxy serves /proxy?url=<target>, fetches the target, rewrites embedded references so navigation stays inside the proxy, and strips headers that would prevent framing.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file")]
        pid_file: Option<PathBuf>,
    },

    #[command(about = "Initialize configuration")]
    #[command(long_about = "Write a default configuration file.\n\nThis creates the data directory and a config.toml you can edit before the first run.")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
    },

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    #[command(about = "Run health checks")]
    Check {
        #[arg(long, help = "Also probe outbound connectivity")]
        full: bool,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Print the active configuration file")]
    Show,
    #[command(about = "Validate the configuration file")]
    Validate,
    #[command(about = "Print the configuration file path")]
    Path,
}
