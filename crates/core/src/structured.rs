//! Decoding structured output from model responses
//!
//! Models asked for JSON still wrap it in code fences, prepend a sentence, or
//! append an offer to help. These helpers find the outermost valid JSON value
//! and deserialize it into a boundary type.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Strip a surrounding markdown code fence, if the response starts with one.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(after_ticks) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string (`json`, `JSON`, ...) on the opening line
    let body = match after_ticks.find('\n') {
        Some(newline) => &after_ticks[newline + 1..],
        None => after_ticks.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Balanced `{...}` or `[...]` starting at byte offset `start`, string aware.
fn balanced_span(content: &str, start: usize) -> Option<&str> {
    let rest = content.get(start..)?;
    let open = rest.chars().next()?;
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Locate the first syntactically valid JSON object or array in `response`.
///
/// Bracketed prose such as `[citation 3]` is skipped because every candidate
/// is validated with `serde_json` before it is accepted.
pub fn extract_json(response: &str) -> Option<&str> {
    let content = strip_code_fence(response);

    content
        .match_indices(['{', '['])
        .map(|(pos, _)| pos)
        .filter_map(|pos| balanced_span(content, pos))
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
}

/// Decode a model response into `T`, tolerating surrounding prose.
pub fn parse_model_output<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json = extract_json(response)
        .ok_or_else(|| Error::malformed_output(format!("no JSON found in: {response}")))?;
    serde_json::from_str(json).map_err(|e| Error::malformed_output(format!("{e}: {json}")))
}
