pub const DEFAULT_PROXY_PORT: u16 = 8118;

pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 500;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_REDIRECTS: u8 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("reframe/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Path+query convention rewritten references use to re-enter the proxy.
pub const PROXY_PREFIX: &str = "/proxy?url=";
