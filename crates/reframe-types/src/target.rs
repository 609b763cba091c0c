use crate::error::{ReframeError, ReframeResult};
use url::Url;

/// A validated target URL, built once per request and discarded with it.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    raw: String,
    url: Url,
}

impl TargetDescriptor {
    /// Parses the raw client-supplied value into an absolute http(s) URL.
    /// Network-range policy lives in the guard; this only enforces shape.
    pub fn parse(raw: &str) -> ReframeResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ReframeError::InvalidUrl("empty target".into()));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ReframeError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ReframeError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        }

        if url.host_str().is_none() {
            return Err(ReframeError::InvalidUrl("missing host".into()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            url,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> url::Host<&str> {
        // Guaranteed by parse(): http(s) URLs always carry a host.
        self.url.host().expect("validated target has a host")
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().expect("validated target has a host")
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
