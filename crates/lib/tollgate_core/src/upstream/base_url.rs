//! Upstream base URL normalization.
//!
//! Operators paste base URLs from provider dashboards; the usual copy/paste
//! damage (smart quotes, trailing commas, quoted ports, missing scheme) is
//! repaired before parsing. The result is always an origin:
//! `scheme://host[:port]`, no path, no trailing slash.

use url::Url;

/// Normalize an operator-supplied base URL to its origin.
///
/// Returns `None` for empty input or anything that is not an http(s) URL
/// with a host.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();
    let cleaned = unquote_ports(cleaned.trim_end_matches(','));
    if cleaned.is_empty() {
        return None;
    }

    let with_scheme = if has_http_scheme(&cleaned) {
        cleaned
    } else {
        format!("https://{cleaned}")
    };

    let url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `host:"443"` / `host:'443'` → `host:443`.
fn unquote_ports(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ':'
            && let Some(&quote) = chars.get(i + 1)
            && (quote == '"' || quote == '\'')
        {
            let digits = chars[i + 2..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits > 0 && chars.get(i + 2 + digits) == Some(&quote) {
                out.push(':');
                out.extend(&chars[i + 2..i + 2 + digits]);
                i += digits + 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
