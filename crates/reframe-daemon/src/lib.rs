#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod fetch;
pub mod guard;
pub mod metrics;
pub mod rewrite;
pub mod sanitize;
pub mod server;

pub use cache::{CacheKey, CacheStats, CachedResponse, ResponseCache};
pub use config::{
    CacheConfig, GuardConfig, LoggingConfig, ProxyConfig, RedactedConfig, ServerConfig,
    UpstreamConfig,
};
pub use fetch::{UpstreamFetcher, UpstreamResponse};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use rewrite::{MediaKind, RewriteContext};
pub use server::ProxyServer;
