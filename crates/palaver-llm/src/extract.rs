//! Structured-output extraction — parse JSON out of free-text model output
//!
//! Models asked for JSON reply with raw JSON, fenced JSON, or prose wrapping
//! an object. Every decision and tool-input parser goes through this one
//! function so malformed output is uniformly an absent value, never an error.

use serde_json::Value;

/// Extract the first JSON object from model output, or `None`.
///
/// Tries, in order: the whole string, a ```json fenced block, the first
/// balanced `{...}` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    balanced_object(trimmed)
        .and_then(|span| serde_json::from_str::<Value>(span).ok())
        .filter(|v| v.is_object())
}

/// Contents of the first ``` fence, with an optional `json` language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// First balanced top-level `{...}` span, string-literal aware.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
