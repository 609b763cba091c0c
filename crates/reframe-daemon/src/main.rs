mod cli;

use clap::Parser;
use cli::{handle_config, init_logging, init_proxy, run_checks, run_proxy, show_version, Cli, Commands};
use reframe_types::ReframeResult;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> ReframeResult<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".reframe"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/reframe"))
    });

    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join("config.toml"));

    match cli.command {
        Commands::Run { pid_file } => {
            run_proxy(&config_path, &data_dir, pid_file).await?;
        }
        Commands::Init { force } => {
            init_proxy(&config_path, &data_dir, force)?;
        }
        Commands::Config { action } => {
            handle_config(&config_path, action)?;
        }
        Commands::Check { full } => {
            run_checks(&config_path, &data_dir, full).await?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
