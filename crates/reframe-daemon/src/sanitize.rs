use hyper::header::{HeaderMap, HeaderValue};

/// Client headers that may travel upstream. Everything else is dropped,
/// `host` above all: the HTTP client sets its own from the target URL.
const FORWARDED_REQUEST_HEADERS: &[&str] = &["accept", "accept-language", "user-agent", "range"];

/// Response headers that must not reach the frame client. Framing blockers
/// (CSP, X-Frame-Options, HSTS) would defeat the proxy's purpose; the
/// hop-by-hop and transport set no longer describes the body we send
/// (decompressed, rewritten, re-framed).
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "frame-options",
    "strict-transport-security",
    "x-content-type-options",
    "x-xss-protection",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "upgrade",
    "te",
    "trailer",
    "proxy-authenticate",
    "proxy-authorization",
];

pub fn request_headers(client: &HeaderMap, forward_cookies: bool) -> HeaderMap {
    let mut forwarded = HeaderMap::new();

    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = client.get(*name) {
            if let Ok(name) = hyper::header::HeaderName::from_bytes(name.as_bytes()) {
                forwarded.insert(name, value.clone());
            }
        }
    }

    if forward_cookies {
        if let Some(value) = client.get("cookie") {
            forwarded.insert(hyper::header::COOKIE, value.clone());
        }
    }

    forwarded
}

pub fn response_headers(upstream: &HeaderMap, forward_cookies: bool) -> HeaderMap {
    let mut out = HeaderMap::new();

    for (name, value) in upstream {
        let lower = name.as_str().to_ascii_lowercase();
        if STRIPPED_RESPONSE_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        if lower == "set-cookie" && !forward_cookies {
            continue;
        }
        // The dispatcher sets content-type explicitly after rewriting.
        if lower == "content-type" {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out.insert(
        hyper::header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer-when-downgrade"),
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderName;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_request_allowlist() {
        let client = headers(&[
            ("accept", "text/html"),
            ("accept-language", "en-US"),
            ("user-agent", "TestBrowser/1.0"),
            ("host", "proxy.local"),
            ("authorization", "Bearer secret"),
            ("x-custom", "nope"),
            ("cookie", "session=abc"),
        ]);

        let forwarded = request_headers(&client, false);
        assert_eq!(forwarded.get("accept").unwrap(), "text/html");
        assert_eq!(forwarded.get("user-agent").unwrap(), "TestBrowser/1.0");
        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("authorization").is_none());
        assert!(forwarded.get("x-custom").is_none());
        assert!(forwarded.get("cookie").is_none());
    }

    #[test]
    fn test_request_cookie_passthrough_opt_in() {
        let client = headers(&[("cookie", "session=abc")]);
        let forwarded = request_headers(&client, true);
        assert_eq!(forwarded.get("cookie").unwrap(), "session=abc");
    }

    #[test]
    fn test_response_strips_framing_blockers() {
        let upstream = headers(&[
            ("content-security-policy", "frame-ancestors 'none'"),
            ("x-frame-options", "DENY"),
            ("strict-transport-security", "max-age=63072000"),
            ("x-content-type-options", "nosniff"),
            ("set-cookie", "id=1"),
            ("content-length", "123"),
            ("transfer-encoding", "chunked"),
            ("connection", "keep-alive"),
            ("cache-control", "max-age=60"),
            ("etag", "\"abc\""),
        ]);

        let out = response_headers(&upstream, false);
        assert!(out.get("content-security-policy").is_none());
        assert!(out.get("x-frame-options").is_none());
        assert!(out.get("strict-transport-security").is_none());
        assert!(out.get("set-cookie").is_none());
        assert!(out.get("content-length").is_none());
        assert!(out.get("transfer-encoding").is_none());
        assert!(out.get("connection").is_none());
        // Harmless headers survive.
        assert_eq!(out.get("cache-control").unwrap(), "max-age=60");
        assert_eq!(out.get("etag").unwrap(), "\"abc\"");
    }

    #[test]
    fn test_response_set_cookie_passthrough_opt_in() {
        let upstream = headers(&[("set-cookie", "id=1"), ("set-cookie", "theme=dark")]);
        let out = response_headers(&upstream, true);
        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_response_drops_content_type_for_dispatcher() {
        let upstream = headers(&[("content-type", "text/html; charset=iso-8859-1")]);
        let out = response_headers(&upstream, false);
        assert!(out.get("content-type").is_none());
    }

    #[test]
    fn test_response_sets_referrer_policy() {
        let out = response_headers(&HeaderMap::new(), false);
        assert_eq!(
            out.get("referrer-policy").unwrap(),
            "no-referrer-when-downgrade"
        );
    }
}
