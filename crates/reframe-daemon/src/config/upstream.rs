use super::constants::{DEFAULT_MAX_REDIRECTS, DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub timeout_secs: u64,
    pub max_redirects: u8,
    pub user_agent: String,
    /// When true, the client `cookie` header is forwarded upstream and
    /// upstream `set-cookie` headers are passed back. Off by default:
    /// cookie passthrough hands third-party cookies to every frame client.
    pub forward_cookies: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            forward_cookies: false,
        }
    }
}
