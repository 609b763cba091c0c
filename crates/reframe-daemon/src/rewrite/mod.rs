pub mod css;
pub mod html;

use crate::config::PROXY_PREFIX;
use hyper::body::Bytes;
use tracing::{debug, warn};
use url::Url;

/// Scope of one response body: the absolute URL relative references
/// resolve against, and the path+query convention that re-enters the proxy.
pub struct RewriteContext {
    pub base: Url,
    pub prefix: String,
}

impl RewriteContext {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            prefix: PROXY_PREFIX.to_string(),
        }
    }

    /// The proxied replacement for a reference, or None when the value must
    /// pass through unmodified: non-network schemes, bare fragments, values
    /// that are already proxied (rewriting twice must not double-encode),
    /// and values that do not resolve (one bad link never fails the page).
    pub fn proxied(&self, reference: &str) -> Option<String> {
        let value = reference.trim();
        if value.is_empty() || value.starts_with('#') {
            return None;
        }

        let lower = value.to_ascii_lowercase();
        for scheme in ["javascript:", "data:", "mailto:", "blob:", "about:", "tel:"] {
            if lower.starts_with(scheme) {
                return None;
            }
        }

        if value.starts_with(self.prefix.as_str()) {
            return None;
        }

        let absolute = match self.base.join(value) {
            Ok(url) => url,
            Err(e) => {
                debug!("Leaving unresolvable reference {:?} as-is: {}", value, e);
                return None;
            }
        };

        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }

        Some(format!(
            "{}{}",
            self.prefix,
            urlencoding::encode(absolute.as_str())
        ))
    }

    /// Proxied form of the page URL itself, used for the injected `<base>`.
    pub fn proxied_base(&self) -> String {
        format!("{}{}", self.prefix, urlencoding::encode(self.base.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Html,
    Css,
    Other,
}

pub fn media_kind(content_type: &str) -> MediaKind {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("text/html") || essence == "application/xhtml+xml" {
        MediaKind::Html
    } else if essence.starts_with("text/css") {
        MediaKind::Css
    } else {
        MediaKind::Other
    }
}

/// Dispatches on the declared content type. Anything that is not HTML or
/// CSS passes through byte-identical.
pub fn rewrite(body: Bytes, content_type: &str, ctx: &RewriteContext) -> Bytes {
    match media_kind(content_type) {
        MediaKind::Html => match html::rewrite_document(&body, ctx) {
            Ok(rewritten) => Bytes::from(rewritten),
            Err(e) => {
                warn!("HTML rewrite failed for {}, relaying unmodified: {}", ctx.base, e);
                body
            }
        },
        MediaKind::Css => {
            let text = String::from_utf8_lossy(&body);
            Bytes::from(css::rewrite_stylesheet(&text, ctx).into_bytes())
        }
        MediaKind::Other => body,
    }
}

/// ASCII case-insensitive substring search. Needles are ASCII, so a match
/// offset is always a char boundary in the haystack.
pub(crate) fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}
