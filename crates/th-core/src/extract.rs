//! URL extraction from tunnel output
//!
//! Pure functions of (pattern, line): safe to call from every monitor
//! concurrently without synchronization.

use crate::types::{DiscoveredUrl, TunnelSpec};

/// Match `line` against the tunnel's pattern and build a normalized URL.
///
/// When the pattern has a first capture group that participated in the
/// match, that group is the URL; otherwise the whole match is.
pub fn extract(spec: &TunnelSpec, line: &str) -> Option<DiscoveredUrl> {
    let captures = spec.pattern.captures(line)?;
    let matched = captures.get(1).or_else(|| captures.get(0))?;

    let raw = matched.as_str().trim();
    if raw.is_empty() {
        return None;
    }

    Some(DiscoveredUrl::new(
        normalize_url(raw),
        spec.note.clone(),
        spec.name.clone(),
    ))
}

/// Prepend `http://` unless the text already starts with a scheme
pub fn normalize_url(raw: &str) -> String {
    if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    }
}

/// RFC 3986 scheme (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`) followed by `://`
fn has_scheme(text: &str) -> bool {
    let Some(end) = text.find("://") else {
        return false;
    };
    let scheme = &text[..end];

    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}
