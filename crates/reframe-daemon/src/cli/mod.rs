mod checks;
mod commands;
mod config_cmd;
mod init;
mod run;
mod utils;

pub use checks::run_checks;
pub use commands::{Cli, Commands};
pub use config_cmd::handle_config;
pub use init::init_proxy;
pub use run::run_proxy;
pub use utils::{init_logging, show_version};
