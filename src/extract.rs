//! Recovery of a JSON value from raw, unreliable model output.
//!
//! Model replies arrive with markdown fences, surrounding prose, literal
//! control bytes, and trailing commas. The recovery steps are ordered
//! cheapest-first; each is a fallback for the previous one. A parse failure
//! after all repairs is terminal for the call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::AppError;

const EXCERPT_LEN: usize = 500;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Recover a JSON value from `raw`.
///
/// Steps: fenced code block interior, falling back to the
/// first-`{`-to-last-`}` slice when there is no fence or the fenced
/// candidate fails to parse; then strip ASCII control characters (a lossy
/// but accepted correction — valid JSON strings never contain raw control
/// bytes); then remove trailing commas; then parse.
pub fn extract_json(raw: &str) -> Result<Value, AppError> {
    if let Some(caps) = FENCED_BLOCK.captures(raw) {
        // A fence tagged with a language other than json keeps the tag
        // word inside the capture; the brace slice still recovers those.
        if let Ok(value) = parse_repaired(&caps[1]) {
            return Ok(value);
        }
    }

    let candidate = brace_slice(raw)?;
    parse_repaired(&candidate).map_err(|e| AppError::MalformedResponse {
        reason: e.to_string(),
        excerpt: excerpt(raw),
    })
}

fn parse_repaired(candidate: &str) -> Result<Value, serde_json::Error> {
    let cleaned: String = candidate
        .chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{7f}'))
        .collect();

    let repaired = TRAILING_COMMA.replace_all(&cleaned, "$1");
    serde_json::from_str(&repaired)
}

fn brace_slice(raw: &str) -> Result<String, AppError> {
    let first = raw.find('{');
    let last = raw.rfind('}');
    match (first, last) {
        (Some(first), Some(last)) if first < last => Ok(raw[first..=last].to_string()),
        _ => Err(AppError::MalformedResponse {
            reason: "no JSON object found (braces absent or inverted)".to_string(),
            excerpt: excerpt(raw),
        }),
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_LEN).collect()
}
