//! Structured-response parsing for capability output.
//!
//! ## Why is this necessary?
//!
//! Vision models are asked for bare JSON and still habitually wrap it in
//! ` ```json ... ``` ` fences, prepend "Here is the JSON:", or emit CRLF line
//! endings. Tolerating that noise in every call site would scatter string
//! hacks through the pipeline, so all of it is isolated here behind one
//! adapter with a strict contract: either the payload decodes into the
//! requested type or you get a [`ParseError`]. Nothing downstream ever
//! special-cases response formatting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Malformed content in an otherwise-successful capability response.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// No JSON object could be located in the response text.
    #[error("no JSON object found in capability response: {snippet:?}")]
    NoJson { snippet: String },

    /// A candidate JSON object was found but did not decode.
    #[error("capability response is not valid JSON: {detail}")]
    InvalidJson { detail: String },
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Strip one outer layer of markdown code fences, if present.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode a capability response into `T`.
///
/// Accepts the bare object, a fenced object, or an object embedded in
/// surrounding prose (first `{` to last `}`). Anything else is a
/// [`ParseError`].
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let cleaned = strip_code_fences(raw);

    if let Ok(v) = serde_json::from_str::<T>(&cleaned) {
        return Ok(v);
    }

    // Fall back to the outermost brace span; models sometimes narrate around
    // the object even when told not to.
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str::<T>(&cleaned[s..=e])
            .map_err(|err| ParseError::InvalidJson {
                detail: err.to_string(),
            }),
        _ => Err(ParseError::NoJson {
            snippet: cleaned.chars().take(80).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        has_map: bool,
    }

    #[test]
    fn bare_json_passes_through() {
        let r: Reply = parse_json(r#"{"has_map": true}"#).unwrap();
        assert!(r.has_map);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"has_map\": false}\n```";
        let r: Reply = parse_json(raw).unwrap();
        assert!(!r.has_map);
    }

    #[test]
    fn fence_without_language_tag() {
        let raw = "```\n{\"has_map\": true}\n```";
        let r: Reply = parse_json(raw).unwrap();
        assert!(r.has_map);
    }

    #[test]
    fn json_embedded_in_prose() {
        let raw = "Sure! Here is the result: {\"has_map\": true} Hope that helps.";
        let r: Reply = parse_json(raw).unwrap();
        assert!(r.has_map);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_json::<Reply>("no structure here").unwrap_err();
        assert!(matches!(err, ParseError::NoJson { .. }));
    }

    #[test]
    fn malformed_object_is_invalid_json() {
        let err = parse_json::<Reply>("{\"has_map\": maybe}").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
    }

    #[test]
    fn strip_fences_leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }
}
