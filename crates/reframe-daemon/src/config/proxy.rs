use reframe_types::{ReframeError, ReframeResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::{info, warn};

use super::cache::CacheConfig;
use super::guard::GuardConfig;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::types::{LogLevel, SecurityWarning, WarningSeverity};
use super::upstream::UpstreamConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub data_dir: PathBuf,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub guard: GuardConfig,
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/var/lib/reframe"));
        Self {
            data_dir: home.join(".reframe"),
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            guard: GuardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> ReframeResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ReframeError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| ReframeError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> ReframeResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ReframeError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReframeError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| ReframeError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("REFRAME_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("REFRAME_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(bind) = std::env::var("REFRAME_BIND") {
            if let Ok(addr) = bind.parse() {
                self.server.bind_address = addr;
                if bind != "127.0.0.1" && bind != "::1" {
                    warn!(
                        "Proxy binding to non-localhost address: {}. Anyone who can reach it can browse through it.",
                        bind
                    );
                }
            }
        }

        if let Ok(hosts) = std::env::var("REFRAME_ALLOWLIST_HOSTS") {
            self.guard.allowed_host_suffixes = hosts
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(ttl) = std::env::var("REFRAME_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.cache.ttl_secs = t;
            }
        }

        if let Ok(entries) = std::env::var("REFRAME_CACHE_MAX_ENTRIES") {
            if let Ok(n) = entries.parse() {
                self.cache.max_entries = n;
            }
        }

        if std::env::var("REFRAME_FORWARD_COOKIES").is_ok() {
            self.upstream.forward_cookies = true;
        }

        if let Ok(level) = std::env::var("REFRAME_LOG_LEVEL") {
            self.logging.level = match level.to_lowercase().as_str() {
                "error" => LogLevel::Error,
                "warn" => LogLevel::Warn,
                "info" => LogLevel::Info,
                "debug" => LogLevel::Debug,
                "trace" => LogLevel::Trace,
                _ => LogLevel::Info,
            };
        }
    }

    pub fn validate(&mut self) -> ReframeResult<()> {
        if self.server.port == 0 {
            return Err(ReframeError::Config("Proxy port cannot be 0".into()));
        }

        if self.server.max_body_size < 1024 {
            return Err(ReframeError::Config(
                "Max body size must be at least 1024 bytes".into(),
            ));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ReframeError::Config(
                "Upstream timeout cannot be 0 seconds".into(),
            ));
        }

        if self.upstream.user_agent.trim().is_empty() {
            return Err(ReframeError::Config("User agent cannot be empty".into()));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ReframeError::Config(
                "Cache capacity cannot be 0 while the cache is enabled".into(),
            ));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ReframeError::Config(
                "Cache TTL cannot be 0 while the cache is enabled".into(),
            ));
        }

        // Allow-list entries are matched as lowercase hostname suffixes.
        self.guard.allowed_host_suffixes = self
            .guard
            .allowed_host_suffixes
            .iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(())
    }

    pub fn check_security_warnings(&self) -> Vec<SecurityWarning> {
        let mut warnings = Vec::new();

        if !self.is_localhost_only() {
            warnings.push(SecurityWarning {
                severity: WarningSeverity::High,
                message: format!(
                    "Proxy bound to non-localhost address: {}",
                    self.server.bind_address
                ),
                recommendation:
                    "Anyone who can reach this address can browse through the proxy. Restrict with firewall rules or an allow-list."
                        .into(),
            });
        }

        if self.upstream.forward_cookies {
            warnings.push(SecurityWarning {
                severity: WarningSeverity::Medium,
                message: "Cookie passthrough is enabled.".into(),
                recommendation:
                    "Upstream cookies will be visible to every client of this proxy. Disable upstream.forward_cookies unless you need authenticated targets."
                        .into(),
            });
        }

        if !self.is_localhost_only() && self.guard.allowed_host_suffixes.is_empty() {
            warnings.push(SecurityWarning {
                severity: WarningSeverity::Medium,
                message: "No host allow-list configured on a non-localhost bind.".into(),
                recommendation:
                    "Set guard.allowed_host_suffixes to limit which sites can be proxied.".into(),
            });
        }

        warnings
    }

    pub fn log_security_warnings(&self) {
        let warnings = self.check_security_warnings();
        if warnings.is_empty() {
            info!("Security check passed - no warnings");
            return;
        }

        for warning in &warnings {
            match warning.severity {
                WarningSeverity::High => {
                    warn!("SECURITY: {}", warning.message);
                    warn!("  -> {}", warning.recommendation);
                }
                WarningSeverity::Medium => {
                    warn!("{}", warning.message);
                    info!("  -> {}", warning.recommendation);
                }
                WarningSeverity::Low => {
                    info!("Note: {}", warning.message);
                }
            }
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind_address, self.server.port)
    }

    pub fn is_localhost_only(&self) -> bool {
        match self.server.bind_address {
            IpAddr::V4(addr) => addr.is_loopback(),
            IpAddr::V6(addr) => addr.is_loopback(),
        }
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            data_dir: self.data_dir.clone(),
            bind: self.server.bind_address,
            port: self.server.port,
            cache_enabled: self.cache.enabled,
            cache_max_entries: self.cache.max_entries,
            cache_ttl_secs: self.cache.ttl_secs,
            upstream_timeout_secs: self.upstream.timeout_secs,
            max_redirects: self.upstream.max_redirects,
            forward_cookies: self.upstream.forward_cookies,
            allowlist_len: self.guard.allowed_host_suffixes.len(),
        }
    }
}

#[derive(Debug)]
pub struct RedactedConfig {
    pub data_dir: PathBuf,
    pub bind: IpAddr,
    pub port: u16,
    pub cache_enabled: bool,
    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,
    pub upstream_timeout_secs: u64,
    pub max_redirects: u8,
    pub forward_cookies: bool,
    pub allowlist_len: usize,
}

impl std::fmt::Display for RedactedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reframe Proxy Configuration")?;
        writeln!(f, "===========================")?;
        writeln!(f, "Data dir: {:?}", self.data_dir)?;
        writeln!(f, "Listen: {}:{}", self.bind, self.port)?;
        writeln!(
            f,
            "Cache: {} ({} entries, {}s TTL)",
            if self.cache_enabled { "ON" } else { "OFF" },
            self.cache_max_entries,
            self.cache_ttl_secs
        )?;
        writeln!(
            f,
            "Upstream: {}s timeout, {} redirects max",
            self.upstream_timeout_secs, self.max_redirects
        )?;
        writeln!(
            f,
            "Cookies: {}",
            if self.forward_cookies { "forwarded" } else { "stripped" }
        )?;
        writeln!(
            f,
            "Allow-list: {}",
            if self.allowlist_len == 0 {
                "any public host".to_string()
            } else {
                format!("{} suffixes", self.allowlist_len)
            }
        )?;
        Ok(())
    }
}
