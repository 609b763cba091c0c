use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReframeError {
    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    #[error("Forbidden host: {0}")]
    ForbiddenHost(String),

    #[error("Host not allowed: {0}")]
    HostNotAllowed(String),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReframeError {
    pub fn http_status(&self) -> u16 {
        match self {
            ReframeError::InvalidUrl(_) => 400,
            ReframeError::ForbiddenHost(_) => 403,
            ReframeError::HostNotAllowed(_) => 403,
            ReframeError::UpstreamUnreachable(_) => 502,
            ReframeError::Config(_) => 500,
            ReframeError::Internal(_) => 500,
        }
    }

    /// Client-facing description. Never includes the detail payload, which
    /// may carry upstream error text or local paths.
    pub fn public_message(&self) -> &'static str {
        match self {
            ReframeError::InvalidUrl(_) => "Missing or invalid target URL",
            ReframeError::ForbiddenHost(_) => "Access to that host is forbidden",
            ReframeError::HostNotAllowed(_) => "Host is not on the allow-list",
            ReframeError::UpstreamUnreachable(_) => "Failed to reach the target server",
            ReframeError::Config(_) => "Proxy configuration error",
            ReframeError::Internal(_) => "Internal proxy error",
        }
    }
}

pub type ReframeResult<T> = Result<T, ReframeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ReframeError::InvalidUrl("x".into()).http_status(), 400);
        assert_eq!(ReframeError::ForbiddenHost("x".into()).http_status(), 403);
        assert_eq!(ReframeError::HostNotAllowed("x".into()).http_status(), 403);
        assert_eq!(ReframeError::UpstreamUnreachable("x".into()).http_status(), 502);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = ReframeError::UpstreamUnreachable("dns error for internal-host.local".into());
        assert!(!err.public_message().contains("internal-host"));
    }
}
