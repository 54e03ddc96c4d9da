//! Clean-up of operator-pasted URLs and inline images.
//!
//! Source rows hold URLs and base64 `data:image` URIs that were pasted by hand
//! and carry stray backticks, spaces and trailing commas. Rules:
//!
//! - Only text values that look like a link are touched: once leading
//!   artifacts are disregarded, the value starts with `http`, `www.` or
//!   `data:image`.
//! - Backticks, spaces and commas are stripped from both ends.
//! - A `data:image` URI longer than [`MAX_DATA_IMAGE_CHARS`] characters is cut
//!   down to its first [`MAX_DATA_IMAGE_CHARS`] characters.
//! - Every other value passes through unchanged.

use crate::core::{SqlValue, TableData};

/// Longest `data:image` URI kept, in characters.
pub const MAX_DATA_IMAGE_CHARS: usize = 1000;

const LINK_PREFIXES: &[&str] = &["http", "www.", "data:image"];
const DATA_IMAGE_PREFIX: &str = "data:image";

fn is_artifact(c: char) -> bool {
    matches!(c, '`' | ' ' | ',')
}

/// Whether a string is a candidate for sanitizing.
pub fn looks_like_link(value: &str) -> bool {
    let body = value.trim_start_matches(is_artifact);
    LINK_PREFIXES.iter().any(|p| body.starts_with(p))
}

/// Sanitize a single string. Returns `None` when the value is left as is.
pub fn sanitize_str(value: &str) -> Option<String> {
    if !looks_like_link(value) {
        return None;
    }

    let trimmed = value.trim_matches(is_artifact);
    let cleaned = if trimmed.starts_with(DATA_IMAGE_PREFIX) {
        match trimmed.char_indices().nth(MAX_DATA_IMAGE_CHARS) {
            Some((cut, _)) => &trimmed[..cut],
            None => trimmed,
        }
    } else {
        trimmed
    };

    (cleaned != value).then(|| cleaned.to_string())
}

/// Sanitize one value in place. Returns true if it changed.
pub fn sanitize_value(value: &mut SqlValue) -> bool {
    let SqlValue::Text(text) = value else {
        return false;
    };
    match sanitize_str(text) {
        Some(cleaned) => {
            *text = cleaned;
            true
        }
        None => false,
    }
}

/// Sanitize every field of every row. Returns the number of changed fields.
pub fn sanitize_table(data: &mut TableData) -> usize {
    data.rows
        .iter_mut()
        .flat_map(|row| row.iter_mut())
        .map(sanitize_value)
        .filter(|changed| *changed)
        .count()
}
