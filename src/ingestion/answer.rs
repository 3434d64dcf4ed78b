// Staged answer parser: object -> strict JSON -> quote repair -> pattern -> raw
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::ingestion::types::{ParseStage, ParsedAnswer};

/// Matches a `text` key followed by a double- or single-quoted value.
/// Single-quoted values must be closed by a quote followed by `,` `}` or end of
/// input so embedded apostrophes survive.
const TEXT_FIELD_PATTERN: &str =
    r#"(?s)["']?\btext["']?\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'(.*?)'\s*(?:[,}]|$))"#;

fn text_field_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(TEXT_FIELD_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Answer text pattern failed to compile: {}", e);
            None
        }
    })
    .as_ref()
}

/// Normalize a `suggestedAnswer` value into display text.
///
/// Never fails; the returned stage tells which rule produced the text.
pub fn parse_answer(raw: Option<&Value>) -> ParsedAnswer {
    match raw {
        Some(value @ Value::Object(map)) => match map.get("text") {
            Some(text) => ParsedAnswer::new(ParseStage::Object, value_text(text)),
            None => ParsedAnswer::new(ParseStage::Raw, value.to_string()),
        },
        Some(Value::String(s)) => parse_answer_str(s),
        Some(Value::Null) | None => ParsedAnswer::new(ParseStage::Raw, String::new()),
        Some(other) => ParsedAnswer::new(ParseStage::Raw, other.to_string()),
    }
}

/// String branch of [`parse_answer`] (stages 2-5)
pub fn parse_answer_str(s: &str) -> ParsedAnswer {
    if let Some(text) = text_from_json(s) {
        return ParsedAnswer::new(ParseStage::StrictJson, text);
    }

    if s.contains('\'') {
        if let Some(text) = text_from_json(&s.replace('\'', "\"")) {
            return ParsedAnswer::new(ParseStage::QuoteRepaired, text);
        }
    }

    if let Some(text) = text_from_pattern(s) {
        return ParsedAnswer::new(ParseStage::PatternMatch, text);
    }

    ParsedAnswer::new(ParseStage::Raw, s)
}

/// Render a JSON value as plain text (strings unquoted, null empty)
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_from_json(s: &str) -> Option<String> {
    match serde_json::from_str::<Value>(s).ok()? {
        Value::Object(map) => map.get("text").map(value_text),
        _ => None,
    }
}

fn text_from_pattern(s: &str) -> Option<String> {
    let caps = text_field_regex()?.captures(s)?;

    if let Some(double) = caps.get(1) {
        return Some(unescape(double.as_str()));
    }
    caps.get(2).map(|single| single.as_str().to_string())
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_with_text() {
        let parsed = parse_answer(Some(&json!({"text": "A"})));
        assert_eq!(parsed, ParsedAnswer::new(ParseStage::Object, "A"));
    }

    #[test]
    fn test_strict_json_string() {
        let parsed = parse_answer(Some(&json!(r#"{"text":"B"}"#)));
        assert_eq!(parsed, ParsedAnswer::new(ParseStage::StrictJson, "B"));
    }

    #[test]
    fn test_single_quoted_json_string() {
        let parsed = parse_answer(Some(&json!("{'text':'C'}")));
        assert_eq!(parsed, ParsedAnswer::new(ParseStage::QuoteRepaired, "C"));
    }

    #[test]
    fn test_plain_string_falls_through() {
        let parsed = parse_answer(Some(&json!("plain string")));
        assert_eq!(parsed, ParsedAnswer::new(ParseStage::Raw, "plain string"));
    }

    #[test]
    fn test_pattern_rescues_apostrophe() {
        let parsed = parse_answer_str("{'text': 'It's encrypted at rest', 'source': 'csv'}");
        assert_eq!(parsed.stage, ParseStage::PatternMatch);
        assert_eq!(parsed.text, "It's encrypted at rest");
    }

    #[test]
    fn test_pattern_rescues_truncated_json() {
        let parsed = parse_answer_str(r#"{"text": "Yes, \"MFA\" is enforced", "refs": ["#);
        assert_eq!(parsed.stage, ParseStage::PatternMatch);
        assert_eq!(parsed.text, r#"Yes, "MFA" is enforced"#);
    }

    #[test]
    fn test_context_key_is_not_text() {
        let parsed = parse_answer_str("context: 'none'");
        assert_eq!(parsed.stage, ParseStage::Raw);
    }

    #[test]
    fn test_json_without_text_is_raw() {
        let parsed = parse_answer_str(r#"{"answer": "x"}"#);
        assert_eq!(parsed.stage, ParseStage::Raw);
        assert_eq!(parsed.text, r#"{"answer": "x"}"#);
    }

    #[test]
    fn test_non_string_values() {
        assert_eq!(parse_answer(None).text, "");
        assert_eq!(parse_answer(Some(&Value::Null)).text, "");
        assert_eq!(parse_answer(Some(&json!(42))).text, "42");
        assert_eq!(parse_answer(Some(&json!({"text": 7}))).text, "7");

        let no_text = parse_answer(Some(&json!({"answer": "x"})));
        assert_eq!(no_text.stage, ParseStage::Raw);
        assert_eq!(no_text.text, r#"{"answer":"x"}"#);
    }

    #[test]
    fn test_stage_numbers_follow_order() {
        assert_eq!(ParseStage::Object.number(), 1);
        assert_eq!(ParseStage::PatternMatch.number(), 4);
        assert_eq!(ParseStage::Raw.number(), 5);
        assert!(!ParseStage::Raw.is_structured());
    }
}
