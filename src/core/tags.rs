//! Tag classifier — splits a raw keyword list into hard and soft tags.
//!
//! Hard tags (quoted or `@`-prefixed) must appear verbatim in most
//! output lines; soft tags only bias style and must never leak into
//! output. Pure functions, no state.

use crate::schema::request::TagSet;

/// Curly-quote variants normalized to straight quotes before
/// classification.
const CURLY_DOUBLE: [char; 2] = ['\u{201C}', '\u{201D}'];
const CURLY_SINGLE: [char; 2] = ['\u{2018}', '\u{2019}'];

/// Classify a raw comma-separated tag string.
///
/// A token wrapped in matching quotes, or prefixed with `@`, is hard;
/// everything else is soft. Hard tags preserve the caller's casing,
/// soft tags are case-folded. Empty or whitespace-only tokens are
/// dropped silently. A token that shows up both quoted and bare lands
/// in `hard` only.
pub fn classify(raw: &str) -> TagSet {
    let mut hard: Vec<String> = Vec::new();
    let mut soft: Vec<String> = Vec::new();

    for token in raw.split(',') {
        let normalized = normalize_quotes(token.trim());
        if normalized.is_empty() {
            continue;
        }

        match strip_hard_marker(&normalized) {
            Some(inner) if !inner.is_empty() => {
                if !hard.iter().any(|t| t == inner) {
                    hard.push(inner.to_string());
                }
            }
            Some(_) => {} // marker with nothing inside
            None => {
                let folded = normalized.to_lowercase();
                if !soft.contains(&folded) {
                    soft.push(folded);
                }
            }
        }
    }

    // A string never appears in both sets; hard wins.
    soft.retain(|s| !hard.iter().any(|h| h.eq_ignore_ascii_case(s)));

    TagSet { hard, soft }
}

fn normalize_quotes(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if CURLY_DOUBLE.contains(&c) {
                '"'
            } else if CURLY_SINGLE.contains(&c) {
                '\''
            } else {
                c
            }
        })
        .collect()
}

/// Returns the inner text if the token carries a hard-tag marker:
/// matching straight quotes around the whole token, or a leading `@`.
fn strip_hard_marker(token: &str) -> Option<&str> {
    if let Some(rest) = token.strip_prefix('@') {
        return Some(rest.trim());
    }
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return Some(token[1..token.len() - 1].trim());
        }
    }
    None
}
