use crate::config::UpstreamConfig;
use crate::{guard, sanitize};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use reframe_types::{ReframeError, ReframeResult, TargetDescriptor};
use reqwest::{redirect, Client, Method, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub content_type: String,
    /// Where the last hop actually answered from. Rewriting resolves
    /// relative references against this, not the requested URL.
    pub final_url: Url,
    pub body: Bytes,
}

pub struct UpstreamFetcher {
    client: Client,
    max_redirects: u8,
    forward_cookies: bool,
    allowed_suffixes: Vec<String>,
}

impl UpstreamFetcher {
    pub fn new(config: &UpstreamConfig, allowed_suffixes: Vec<String>) -> ReframeResult<Self> {
        // Redirects are never left to the client library: every hop must
        // pass the guard first, so the loop below follows them by hand.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ReframeError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            forward_cookies: config.forward_cookies,
            allowed_suffixes,
        })
    }

    pub async fn fetch(
        &self,
        target: &TargetDescriptor,
        method: Method,
        client_headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> ReframeResult<UpstreamResponse> {
        let forward = sanitize::request_headers(client_headers, self.forward_cookies);

        let mut url = target.url().clone();
        let mut method = method;
        let mut body = body;
        let mut hops = 0u8;

        loop {
            debug!("Upstream {} {}", method, url);

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .headers(forward.clone());
            if let Some(ref bytes) = body {
                request = request.body(bytes.clone());
            }

            let response = request.send().await.map_err(|e| send_error(&url, &e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(hyper::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                if let Some(location) = location {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(ReframeError::UpstreamUnreachable(format!(
                            "redirect limit exceeded at {}",
                            url
                        )));
                    }

                    let next = redirect_target(&url, &location).ok_or_else(|| {
                        ReframeError::UpstreamUnreachable(format!(
                            "unparsable redirect location {:?} from {}",
                            location, url
                        ))
                    })?;

                    // Each hop is vetted exactly like the original target;
                    // a redirect into a private range kills the fetch.
                    let vetted = guard::resolve(next.as_str(), &self.allowed_suffixes)?;

                    if downgrade_to_get(status, &method) {
                        method = Method::GET;
                        body = None;
                    }
                    url = vetted.into_url();
                    continue;
                }
                // 3xx without Location (304 and friends): relay as-is.
            }

            let headers = response.headers().clone();
            let content_type = extract_content_type(&headers);
            let final_url = response.url().clone();
            let bytes = response.bytes().await.map_err(|e| {
                ReframeError::UpstreamUnreachable(format!(
                    "failed reading body from {}: {}",
                    final_url, e
                ))
            })?;

            return Ok(UpstreamResponse {
                status: status.as_u16(),
                headers,
                content_type,
                final_url,
                body: bytes,
            });
        }
    }
}

fn send_error(url: &Url, e: &reqwest::Error) -> ReframeError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ReframeError::UpstreamUnreachable(format!("{} for {}: {}", kind, url, e))
}

fn redirect_target(current: &Url, location: &str) -> Option<Url> {
    current.join(location).ok()
}

/// 303 always becomes GET; 301/302 do for anything but GET/HEAD, matching
/// what browsers actually do. 307/308 keep method and body.
fn downgrade_to_get(status: StatusCode, method: &Method) -> bool {
    status == StatusCode::SEE_OTHER
        || ((status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND)
            && *method != Method::GET
            && *method != Method::HEAD)
}

fn extract_content_type(headers: &HeaderMap) -> String {
    headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}
