use super::{find_ci, RewriteContext};

/// Rewrites every `url(...)` reference and `@import "..."` string in a
/// stylesheet so it re-enters the proxy. Original quoting is preserved;
/// anything that does not parse is left exactly as written.
pub fn rewrite_stylesheet(css: &str, ctx: &RewriteContext) -> String {
    let pass_one = rewrite_url_functions(css, ctx);
    rewrite_import_strings(&pass_one, ctx)
}

fn rewrite_url_functions(css: &str, ctx: &RewriteContext) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut pos = 0;

    while let Some(start) = find_ci(css, "url(", pos) {
        // "curl(" and friends are not the url() function.
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            out.push_str(&css[pos..start + 4]);
            pos = start + 4;
            continue;
        }

        let Some(token) = parse_url_token(&css[start + 4..]) else {
            // Unbalanced from here on; emit the remainder untouched.
            break;
        };

        out.push_str(&css[pos..start]);
        out.push_str("url(");
        let rewritten = ctx
            .proxied(token.value)
            .unwrap_or_else(|| token.value.to_string());
        match token.quote {
            Some(q) => {
                out.push(q);
                out.push_str(&rewritten);
                out.push(q);
            }
            None => out.push_str(&rewritten),
        }
        out.push(')');
        pos = start + 4 + token.consumed;
    }

    out.push_str(&css[pos..]);
    out
}

fn rewrite_import_strings(css: &str, ctx: &RewriteContext) -> String {
    let mut out = String::with_capacity(css.len());
    let mut pos = 0;

    while let Some(start) = find_ci(css, "@import", pos) {
        let after = &css[start + 7..];
        let ws = after.len() - after.trim_start().len();
        let rest = &after[ws..];

        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            // `@import url(...)` was handled by the url() pass.
            out.push_str(&css[pos..start + 7]);
            pos = start + 7;
            continue;
        };

        let inner = &rest[1..];
        let Some(close) = inner.find(quote) else {
            break;
        };

        let value = &inner[..close];
        out.push_str(&css[pos..start]);
        out.push_str("@import ");
        out.push(quote);
        out.push_str(&ctx.proxied(value).unwrap_or_else(|| value.to_string()));
        out.push(quote);
        pos = start + 7 + ws + 1 + close + 1;
    }

    out.push_str(&css[pos..]);
    out
}

struct UrlToken<'a> {
    quote: Option<char>,
    value: &'a str,
    /// Bytes consumed after the opening paren, closing paren included.
    consumed: usize,
}

fn parse_url_token(after_paren: &str) -> Option<UrlToken<'_>> {
    let bytes = after_paren.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    match bytes[i] {
        q @ (b'"' | b'\'') => {
            let inner = &after_paren[i + 1..];
            let close = inner.find(q as char)?;
            let value = &inner[..close];
            let mut j = i + 1 + close + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= bytes.len() || bytes[j] != b')' {
                return None;
            }
            Some(UrlToken {
                quote: Some(q as char),
                value,
                consumed: j + 1,
            })
        }
        _ => {
            let close = after_paren[i..].find(')')? + i;
            Some(UrlToken {
                quote: None,
                value: after_paren[i..close].trim(),
                consumed: close + 1,
            })
        }
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}
