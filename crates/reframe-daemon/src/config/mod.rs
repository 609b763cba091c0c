mod cache;
mod constants;
mod guard;
mod logging;
mod proxy;
mod server;
mod types;
mod upstream;

pub use cache::CacheConfig;
pub use constants::*;
pub use guard::GuardConfig;
pub use logging::LoggingConfig;
pub use proxy::{ProxyConfig, RedactedConfig};
pub use server::ServerConfig;
pub use types::*;
pub use upstream::UpstreamConfig;
