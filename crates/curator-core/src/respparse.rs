//! LLM response parsing.
//!
//! Models are asked for a bare JSON object but routinely wrap it in prose or
//! code fences, so extraction scans for the first balanced object instead of
//! trusting the whole payload. Missing fields default, out-of-range scores
//! clamp, the claimed total is discarded, and the claimed article identity is
//! never accepted.

use serde::Deserialize;

use crate::error::ParseError;
use crate::scoring::{Scores, Summary};

/// Fallback summary when the model omitted one entirely.
const DEFAULT_SUMMARY: &str = "No summary was generated for this article.";

const DEFAULT_QUALITY: i64 = 20;
const DEFAULT_ORIGINALITY: i64 = 15;
const DEFAULT_ENTERTAINMENT: i64 = 15;

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    article_id: Option<String>,
    #[serde(default)]
    quality_score: Option<i64>,
    #[serde(default)]
    originality_score: Option<i64>,
    #[serde(default)]
    entertainment_score: Option<i64>,
    #[serde(default)]
    total_score: Option<i64>,
    #[serde(default)]
    ai_summary: Option<String>,
}

/// A fully normalized model response, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub article_id: String,
    pub scores: Scores,
    pub ai_summary: Summary,
}

/// Slice out the first balanced `{…}` object, honoring strings and escapes.
pub fn extract_json_object(text: &str) -> Option<&str> {
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

/// Parse a chat response into a normalized evaluation for the expected
/// article. Parsing is deterministic: the same content always yields the
/// same result.
pub fn parse_response(
    content: &str,
    expected_article_id: &str,
) -> Result<ParsedEvaluation, ParseError> {
    let object = extract_json_object(content).ok_or(ParseError::NoJsonObject)?;
    let raw: RawEvaluation = serde_json::from_str(object)?;

    if let Some(claimed) = raw.article_id.as_deref()
        && claimed != expected_article_id
    {
        tracing::warn!(
            claimed,
            expected = expected_article_id,
            "model returned a different article id; overwriting"
        );
    }

    let scores = Scores::clamped(
        raw.quality_score.unwrap_or(DEFAULT_QUALITY),
        raw.originality_score.unwrap_or(DEFAULT_ORIGINALITY),
        raw.entertainment_score.unwrap_or(DEFAULT_ENTERTAINMENT),
    );

    if let Some(claimed_total) = raw.total_score
        && claimed_total != scores.total() as i64
    {
        tracing::debug!(
            claimed_total,
            recomputed = scores.total(),
            "model total disagrees with component sum; recomputed"
        );
    }

    let ai_summary = Summary::normalized(raw.ai_summary.as_deref().unwrap_or(DEFAULT_SUMMARY));

    Ok(ParsedEvaluation {
        article_id: expected_article_id.to_string(),
        scores,
        ai_summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extract_plain_object() {
        let text = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_from_surrounding_prose() {
        let text = "Here is my evaluation:\n```json\n{\"quality_score\": 30}\n```\nDone.";
        assert_eq!(extract_json_object(text), Some(r#"{"quality_score": 30}"#));
    }

    #[test]
    fn test_extract_nested_and_braces_in_strings() {
        let text = r#"noise {"a": {"b": "}"}, "c": "{"} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": {"b": "}"}, "c": "{"}"#)
        );
    }

    #[test]
    fn test_extract_none_without_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{unterminated").is_none());
    }

    #[test]
    fn test_parse_happy_path() {
        let content = r#"{"article_id": "k_u", "quality_score": 30,
            "originality_score": 20, "entertainment_score": 20,
            "total_score": 70, "ai_summary": "sixteen-char text here."}"#;
        let parsed = parse_response(content, "k_u").unwrap();
        assert_eq!(parsed.scores.total(), 70);
        assert_eq!(parsed.ai_summary.as_str(), "sixteen-char text here.");
    }

    #[test]
    fn test_parse_overwrites_claimed_article_id() {
        let content = r#"{"article_id": "somebody_else", "quality_score": 10,
            "originality_score": 10, "entertainment_score": 10,
            "ai_summary": "a reasonable summary"}"#;
        let parsed = parse_response(content, "k_u").unwrap();
        assert_eq!(parsed.article_id, "k_u");
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let parsed = parse_response("{}", "k_u").unwrap();
        assert_eq!(parsed.scores.pattern(), "20/15/15");
        assert!(parsed.ai_summary.as_str().chars().count() >= 10);
    }

    #[test]
    fn test_parse_clamps_out_of_range() {
        let content = r#"{"quality_score": 50, "originality_score": -3,
            "entertainment_score": 31, "ai_summary": "a reasonable summary"}"#;
        let parsed = parse_response(content, "k_u").unwrap();
        assert_eq!(parsed.scores.pattern(), "40/0/30");
    }

    #[test]
    fn test_parse_recomputes_total() {
        let content = r#"{"quality_score": 30, "originality_score": 20,
            "entertainment_score": 20, "total_score": 99,
            "ai_summary": "a reasonable summary"}"#;
        let parsed = parse_response(content, "k_u").unwrap();
        assert_eq!(parsed.scores.total(), 70);
    }

    #[test]
    fn test_parse_normalizes_summary_bounds() {
        let long = format!(r#"{{"ai_summary": "{}"}}"#, "x".repeat(400));
        let parsed = parse_response(&long, "k_u").unwrap();
        assert_eq!(parsed.ai_summary.as_str().chars().count(), 300);

        let short = r#"{"ai_summary": "tiny"}"#;
        let parsed = parse_response(short, "k_u").unwrap();
        assert_eq!(parsed.ai_summary.as_str().chars().count(), 10);
    }

    #[test]
    fn test_parse_failure_without_json() {
        assert!(matches!(
            parse_response("I refuse to answer.", "k_u"),
            Err(ParseError::NoJsonObject)
        ));
    }

    proptest! {
        // Re-parsing a previously parsed response is bit-identical
        #[test]
        fn prop_parse_is_idempotent(q in 0i64..=40, o in 0i64..=30, e in 0i64..=30,
                                    summary in "[a-z ]{10,40}") {
            let content = format!(
                r#"{{"quality_score": {q}, "originality_score": {o},
                    "entertainment_score": {e}, "ai_summary": "{summary}"}}"#
            );
            let first = parse_response(&content, "k_u").unwrap();
            let second = parse_response(&content, "k_u").unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
