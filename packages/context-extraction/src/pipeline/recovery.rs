//! Recover a JSON object from free-form model output.
//!
//! Models wrap JSON in prose, code fences or both. Every agent applies the
//! same policy, in order:
//!
//! 1. the whole response
//! 2. the body of a fenced code block
//! 3. the first balanced `{...}` span (string and escape aware)
//! 4. everything from the first `{` to the last `}`
//! 5. balanced spans opening at later braces, for prose that uses `{`
//!
//! Only JSON objects count. When nothing parses, the caller gets a
//! [`SentinelFailure`] carrying the reason and the untouched response.

use serde_json::{Map, Value};

use crate::pipeline::schema::json_kind;
use crate::types::record::{CandidateRecord, Outcome, SentinelFailure};

/// Message used when the response contains no `{` at all.
pub const NO_JSON_OBJECT: &str = "No JSON object found in response.";

/// Recover the first JSON object from a model response.
pub fn recover_object(response: &str) -> Result<Map<String, Value>, SentinelFailure> {
    let mut last_error = None;

    for candidate in candidates(response) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(other) => last_error = Some(format!("expected a JSON object, found {}", json_kind(&other))),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    let error = if response.contains('{') {
        format!(
            "Could not parse JSON object: {}",
            last_error.unwrap_or_else(|| "unbalanced braces".to_string())
        )
    } else {
        NO_JSON_OBJECT.to_string()
    };
    Err(SentinelFailure::new(error, response))
}

/// Recover a candidate record, or the sentinel that replaces it.
pub fn recover_candidate(response: &str) -> Outcome<CandidateRecord> {
    match recover_object(response) {
        Ok(map) => Outcome::Ok(CandidateRecord::new(map)),
        Err(failure) => Outcome::Failed(failure),
    }
}

/// Upper bound on the later opening braces tried.
const MAX_LATER_STARTS: usize = 16;

/// Spans worth parsing, in policy order.
fn candidates(response: &str) -> Vec<&str> {
    let mut spans = vec![response.trim()];
    spans.extend(fenced_block(response));

    let mut starts = response.match_indices('{').map(|(i, _)| i);
    if let Some(first) = starts.next() {
        spans.extend(balanced_object(&response[first..]));
        spans.extend(greedy_object(response));
        spans.extend(
            starts
                .take(MAX_LATER_STARTS)
                .filter_map(|start| balanced_object(&response[start..])),
        );
    }

    spans.dedup();
    spans
}

/// Body of the first ``` fence, with an optional language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let tag = after[..body_start].trim();
    if !tag.is_empty() && !tag.eq_ignore_ascii_case("json") {
        return None;
    }
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First `{...}` span whose braces balance outside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Everything from the first `{` to the last `}`.
fn greedy_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
