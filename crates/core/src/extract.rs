//! JSON Payload Extraction
//!
//! Generation responses for module planning and steps are asked to be pure
//! JSON, but models routinely wrap the payload in commentary or markdown
//! fences. This module isolates the bracket-matching salvage logic as a pure
//! function so its edge cases are testable without a live capability.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object or array found in the response")]
    NotFound,
    #[error("JSON structure is incomplete (missing closing brace or bracket)")]
    Unterminated,
    #[error("extracted span is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Extracts the outermost JSON object or array embedded in `text`.
///
/// A fenced ``` / ```json block takes priority; otherwise the span from the
/// first `{`/`[` to the last `}`/`]` is parsed.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ExtractError> {
    let target = fenced_block(text).unwrap_or(text);

    let first_brace = target.find('{');
    let first_bracket = target.find('[');
    let start = match (first_brace, first_bracket) {
        (Some(b), Some(k)) => b.min(k),
        (Some(b), None) => b,
        (None, Some(k)) => k,
        (None, None) => return Err(ExtractError::NotFound),
    };

    let last_brace = target.rfind('}');
    let last_bracket = target.rfind(']');
    let end = match last_brace.max(last_bracket) {
        Some(end) if end > start => end,
        _ => return Err(ExtractError::Unterminated),
    };

    Ok(serde_json::from_str(&target[start..=end])?)
}

/// Returns the inside of the first markdown code fence, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an optional language tag up to the end of the opening line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_array_parses() {
        let value = extract_json(r#"[{"command": "speak"}]"#).unwrap();
        assert_eq!(value, json!([{ "command": "speak" }]));
    }

    #[test]
    fn fenced_json_block_is_preferred() {
        let text = "Sure, here is the plan:\n```json\n{\"plan\": [\"a\", \"b\"]}\n```\nHope it helps!";
        let value = extract_json(text).unwrap();
        assert_eq!(value["plan"], json!(["a", "b"]));
    }

    #[test]
    fn bare_fence_without_language_tag_works() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn surrounding_commentary_is_stripped() {
        let text = "Of course! The commands are [\"x\", \"y\"] — enjoy.";
        assert_eq!(extract_json(text).unwrap(), json!(["x", "y"]));
    }

    #[test]
    fn nested_structures_take_the_outermost_span() {
        let text = r#"prefix {"outer": {"inner": [1, 2]}} suffix"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["outer"]["inner"], json!([1, 2]));
    }

    #[test]
    fn missing_json_is_not_found() {
        assert!(matches!(
            extract_json("no structured data here"),
            Err(ExtractError::NotFound)
        ));
    }

    #[test]
    fn unterminated_json_is_reported() {
        assert!(matches!(
            extract_json(r#"{"plan": ["a""#),
            Err(ExtractError::Unterminated)
        ));
    }

    #[test]
    fn invalid_span_is_a_parse_error() {
        assert!(matches!(
            extract_json("{not json}"),
            Err(ExtractError::Parse(_))
        ));
    }
}
