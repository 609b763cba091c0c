use super::{css, find_ci, RewriteContext};
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HtmlRewriter, Settings};
use std::cell::RefCell;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Structured attribute rewriting over a streaming parse. String matching
/// on raw markup is not used anywhere: attribute values that merely look
/// like other attributes cannot be corrupted.
///
/// Besides the reference attributes, the pass:
/// - replaces any `<base>` with one pointing at the proxied page URL, so
///   references the handlers did not catch still resolve through the proxy;
/// - injects a `<meta name="reframe-target">` marker carrying the original
///   absolute URL for the embedding client;
/// - drops `integrity` attributes (rewritten subresources can no longer
///   match their digests) and CSP meta tags;
/// - runs the stylesheet rewriter over `<style>` bodies and `style=`
///   attributes.
pub fn rewrite_document(body: &[u8], ctx: &RewriteContext) -> Result<Vec<u8>, RewritingError> {
    let mut output = Vec::with_capacity(body.len() + 512);

    let head_injection = format!(
        r#"<base href="{}"><meta name="reframe-target" content="{}">"#,
        ctx.proxied_base(),
        escape_attr(ctx.base.as_str())
    );
    let style_text = RefCell::new(String::new());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("base", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("head", |el| {
                    el.prepend(&head_injection, ContentType::Html);
                    Ok(())
                }),
                element!("a[href], area[href], link[href]", |el| {
                    rewrite_attr(el, "href", ctx)
                }),
                element!("form[action]", |el| rewrite_attr(el, "action", ctx)),
                element!(
                    "img[src], script[src], iframe[src], embed[src], source[src], \
                     video[src], audio[src], track[src], input[src]",
                    |el| rewrite_attr(el, "src", ctx)
                ),
                element!("img[data-src]", |el| rewrite_attr(el, "data-src", ctx)),
                element!("video[poster]", |el| rewrite_attr(el, "poster", ctx)),
                element!("img[srcset], source[srcset]", |el| {
                    if let Some(value) = el.get_attribute("srcset") {
                        el.set_attribute("srcset", &rewrite_srcset(&value, ctx))?;
                    }
                    Ok(())
                }),
                element!("link[integrity], script[integrity]", |el| {
                    el.remove_attribute("integrity");
                    Ok(())
                }),
                element!("meta", |el| rewrite_meta(el, ctx)),
                element!("[style]", |el| {
                    if let Some(value) = el.get_attribute("style") {
                        let rewritten = css::rewrite_stylesheet(&value, ctx);
                        if rewritten != value {
                            el.set_attribute("style", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                text!("style", |chunk| {
                    // Text nodes arrive in fragments; buffer until the last
                    // one so url() tokens split across chunks stay whole.
                    let mut buffered = style_text.borrow_mut();
                    buffered.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let rewritten = css::rewrite_stylesheet(&buffered, ctx);
                        chunk.replace(&rewritten, ContentType::Html);
                        buffered.clear();
                    } else {
                        chunk.remove();
                    }
                    Ok(())
                }),
            ],
            ..Settings::new()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(body)?;
    rewriter.end()?;

    Ok(output)
}

fn rewrite_attr(el: &mut Element, attr: &str, ctx: &RewriteContext) -> HandlerResult {
    if let Some(value) = el.get_attribute(attr) {
        if let Some(proxied) = ctx.proxied(&value) {
            el.set_attribute(attr, &proxied)?;
        }
    }
    Ok(())
}

fn rewrite_meta(el: &mut Element, ctx: &RewriteContext) -> HandlerResult {
    let Some(http_equiv) = el.get_attribute("http-equiv") else {
        return Ok(());
    };

    match http_equiv.to_ascii_lowercase().as_str() {
        "content-security-policy" | "x-content-security-policy" | "x-webkit-csp" => {
            el.remove();
        }
        "refresh" => {
            if let Some(content) = el.get_attribute("content") {
                if let Some(rewritten) = rewrite_refresh_content(&content, ctx) {
                    el.set_attribute("content", &rewritten)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// `content="5; url=/next"` keeps its delay, the URL goes through the proxy.
fn rewrite_refresh_content(content: &str, ctx: &RewriteContext) -> Option<String> {
    let idx = find_ci(content, "url=", 0)?;
    let value = content[idx + 4..].trim().trim_matches(|c| c == '"' || c == '\'');
    let proxied = ctx.proxied(value)?;
    Some(format!("{}url={}", &content[..idx], proxied))
}

/// Comma-separated candidates, each `<url> <descriptor>?`; descriptors
/// survive untouched.
fn rewrite_srcset(value: &str, ctx: &RewriteContext) -> String {
    value
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            let mut parts = candidate.splitn(2, char::is_whitespace);
            let reference = parts.next().unwrap_or("");
            let descriptor = parts.next().map(str::trim).unwrap_or("");

            let rewritten = ctx
                .proxied(reference)
                .unwrap_or_else(|| reference.to_string());
            if descriptor.is_empty() {
                rewritten
            } else {
                format!("{} {}", rewritten, descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn rewrite(html: &str, base: &str) -> String {
        let ctx = RewriteContext::new(Url::parse(base).unwrap());
        String::from_utf8(rewrite_document(html.as_bytes(), &ctx).unwrap()).unwrap()
    }

    #[test]
    fn test_anchor_href_rewritten() {
        let out = rewrite(
            r#"<a href="/about">About</a>"#,
            "https://example.com/",
        );
        assert_eq!(
            out,
            r#"<a href="/proxy?url=https%3A%2F%2Fexample.com%2Fabout">About</a>"#
        );
    }

    #[test]
    fn test_absolute_href_rewritten() {
        let out = rewrite(
            r#"<a href="https://other.example.net/page">x</a>"#,
            "https://example.com/",
        );
        assert!(out.contains("/proxy?url=https%3A%2F%2Fother.example.net%2Fpage"));
    }

    #[test]
    fn test_relative_href_resolves_against_page_path() {
        let out = rewrite(r#"<a href="sibling.html">x</a>"#, "https://example.com/docs/index.html");
        assert!(out.contains("/proxy?url=https%3A%2F%2Fexample.com%2Fdocs%2Fsibling.html"));
    }

    #[test]
    fn test_script_img_iframe_src_rewritten() {
        let out = rewrite(
            r#"<script src="/app.js"></script><img src="logo.png"><iframe src="//embed.example.net/w"></iframe>"#,
            "https://example.com/",
        );
        assert!(out.contains(r#"<script src="/proxy?url=https%3A%2F%2Fexample.com%2Fapp.js">"#));
        assert!(out.contains(r#"<img src="/proxy?url=https%3A%2F%2Fexample.com%2Flogo.png">"#));
        assert!(out.contains("/proxy?url=https%3A%2F%2Fembed.example.net%2Fw"));
    }

    #[test]
    fn test_form_action_rewritten() {
        let out = rewrite(r#"<form action="/search" method="get"></form>"#, "https://example.com/");
        assert!(out.contains(r#"action="/proxy?url=https%3A%2F%2Fexample.com%2Fsearch""#));
    }

    #[test]
    fn test_javascript_and_data_and_fragment_untouched() {
        let html = r##"<a href="javascript:void(0)">a</a><a href="#top">b</a><img src="data:image/gif;base64,R0l">"##;
        assert_eq!(rewrite(html, "https://example.com/"), html);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = rewrite(r#"<a href="/about">x</a>"#, "https://example.com/");
        let ctx = RewriteContext::new(Url::parse("https://example.com/").unwrap());
        let twice =
            String::from_utf8(rewrite_document(once.as_bytes(), &ctx).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_head_gets_base_and_marker() {
        let out = rewrite(
            "<html><head><title>t</title></head><body></body></html>",
            "https://example.com/page",
        );
        assert!(out.contains(r#"<base href="/proxy?url=https%3A%2F%2Fexample.com%2Fpage">"#));
        assert!(out.contains(r#"<meta name="reframe-target" content="https://example.com/page">"#));
        // Injection lands before the page's own head content.
        assert!(out.find("<base").unwrap() < out.find("<title>").unwrap());
    }

    #[test]
    fn test_existing_base_replaced() {
        let out = rewrite(
            r#"<html><head><base href="https://example.com/old/"></head><body></body></html>"#,
            "https://example.com/page",
        );
        assert!(!out.contains("example.com/old"));
        assert_eq!(out.matches("<base").count(), 1);
    }

    #[test]
    fn test_srcset_descriptors_survive() {
        let out = rewrite(
            r#"<img srcset="/a.png 1x, /b.png 2x">"#,
            "https://example.com/",
        );
        assert!(out.contains("/proxy?url=https%3A%2F%2Fexample.com%2Fa.png 1x"));
        assert!(out.contains("/proxy?url=https%3A%2F%2Fexample.com%2Fb.png 2x"));
    }

    #[test]
    fn test_meta_refresh_rewritten() {
        let out = rewrite(
            r#"<meta http-equiv="refresh" content="5; url=/next">"#,
            "https://example.com/",
        );
        assert!(out.contains("5; url=/proxy?url=https%3A%2F%2Fexample.com%2Fnext"));
    }

    #[test]
    fn test_csp_meta_removed() {
        let out = rewrite(
            r#"<head><meta http-equiv="Content-Security-Policy" content="default-src 'none'"><meta charset="utf-8"></head>"#,
            "https://example.com/",
        );
        assert!(!out.contains("Content-Security-Policy"));
        assert!(out.contains(r#"<meta charset="utf-8">"#));
    }

    #[test]
    fn test_integrity_stripped() {
        let out = rewrite(
            r#"<script src="/app.js" integrity="sha384-abc" crossorigin="anonymous"></script>"#,
            "https://example.com/",
        );
        assert!(!out.contains("integrity"));
        assert!(out.contains("crossorigin"));
    }

    #[test]
    fn test_style_element_css_rewritten() {
        let out = rewrite(
            r#"<style>body { background: url(/bg.png); }</style>"#,
            "https://example.com/",
        );
        assert!(out.contains("url(/proxy?url=https%3A%2F%2Fexample.com%2Fbg.png)"));
    }

    #[test]
    fn test_style_attribute_css_rewritten() {
        let out = rewrite(
            r#"<div style="background: url('/bg.png')">x</div>"#,
            "https://example.com/",
        );
        assert!(out.contains("url('/proxy?url=https%3A%2F%2Fexample.com%2Fbg.png')"));
    }

    #[test]
    fn test_poster_and_data_src_rewritten() {
        let out = rewrite(
            r#"<video poster="/p.jpg"></video><img data-src="/lazy.png">"#,
            "https://example.com/",
        );
        assert!(out.contains("/proxy?url=https%3A%2F%2Fexample.com%2Fp.jpg"));
        assert!(out.contains("/proxy?url=https%3A%2F%2Fexample.com%2Flazy.png"));
    }

    #[test]
    fn test_malformed_value_passes_through() {
        let html = r#"<a href="https://">broken</a>"#;
        let out = rewrite(html, "https://example.com/");
        assert!(out.contains("broken"));
    }
}
