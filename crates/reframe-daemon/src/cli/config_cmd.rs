use super::commands::ConfigAction;
use reframe_daemon::ProxyConfig;
use reframe_types::{ReframeError, ReframeResult};
use std::path::PathBuf;

pub fn handle_config(config_path: &PathBuf, action: Option<ConfigAction>) -> ReframeResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .map_err(|e| ReframeError::Config(format!("Failed to read config: {}", e)))?;
                println!("{}", content);
            } else {
                println!("\x1b[38;5;245mNo configuration file found at {:?}\x1b[0m", config_path);
                println!("Run '\x1b[38;5;51mreframe init\x1b[0m' to create one");
            }
        }
        Some(ConfigAction::Validate) => {
            if config_path.exists() {
                match ProxyConfig::load(config_path) {
                    Ok(_) => println!("\x1b[38;5;46m[+]\x1b[0m Configuration is valid"),
                    Err(e) => println!("\x1b[38;5;196m[-]\x1b[0m Configuration error: {}", e),
                }
            } else {
                println!("\x1b[38;5;245mNo configuration file found at {:?}\x1b[0m", config_path);
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
