use reframe_daemon::ProxyConfig;
use reframe_types::{ReframeError, ReframeResult};
use std::path::PathBuf;

pub fn init_proxy(config_path: &PathBuf, data_dir: &PathBuf, force: bool) -> ReframeResult<()> {
    if config_path.exists() && !force {
        println!("Configuration already exists at {:?}", config_path);
        println!("Use '\x1b[38;5;51mreframe init --force\x1b[0m' to overwrite");
        return Ok(());
    }

    std::fs::create_dir_all(data_dir)
        .map_err(|e| ReframeError::Config(format!("Failed to create data directory: {}", e)))?;

    let mut config = ProxyConfig::default();
    config.data_dir = data_dir.clone();
    config.save(config_path)?;

    println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {:?}", config_path);
    println!();
    println!("Edit it to set an allow-list or cache limits, then start with:");
    println!("  \x1b[38;5;51mreframe run\x1b[0m");
    Ok(())
}
