// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON payloads embedded in message text.
//!
//! ChatGPT sometimes emits tool-call payloads (Canvas declarations, document
//! updates) as literal message text. These helpers recognise such payloads.
//! Every operation here is fail-open: text that does not parse is reported as
//! `None` and the caller keeps the original text untouched.

use serde_json::{Map, Value};

/// Parses `text` as a JSON object.
///
/// Returns `None` when the text is not valid JSON or when it parses to
/// anything other than an object.
#[must_use]
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Returns `true` if trimmed `text` is delimited like a JSON object.
#[must_use]
pub fn looks_like_object(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Returns the first update's `replacement` value.
///
/// Matches payloads shaped like `{"updates": [{"replacement": ...}, ...]}`.
/// Later updates are ignored.
#[must_use]
pub fn first_replacement(payload: &Map<String, Value>) -> Option<&Value> {
    payload
        .get("updates")?
        .as_array()?
        .first()?
        .as_object()?
        .get("replacement")
}

/// Returns the language suffix of a `code/<lang>` type tag.
#[must_use]
pub fn code_language(kind: &str) -> Option<&str> {
    kind.strip_prefix("code/")
}

/// Wraps `body` in a fenced code block tagged with `lang` (may be empty).
#[must_use]
pub fn fence(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```")
}

/// Pretty-prints a JSON value with two-space indentation.
#[must_use]
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Converts a JSON value to display text.
///
/// Strings are returned without quotes; everything else as compact JSON.
#[must_use]
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON truthiness: `null`, `false`, `0`, and empty strings, arrays and
/// objects are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Returns the string at `key`, or `None` if absent or not a string.
pub(crate) fn get_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_text() {
        let map = parse_object(r#"  {"a": 1}  "#).unwrap();
        assert_eq!(map.get("a"), Some(&json!(1)));
    }

    #[test]
    fn rejects_malformed_and_non_object_text() {
        assert!(parse_object("{not json}").is_none());
        assert!(parse_object("[1, 2]").is_none());
        assert!(parse_object("plain text").is_none());
    }

    #[test]
    fn detects_object_delimiters() {
        assert!(looks_like_object("  {\"a\": 1}\n"));
        assert!(looks_like_object("{ just braces }"));
        assert!(!looks_like_object("{ unterminated"));
        assert!(!looks_like_object("text {}"));
    }

    #[test]
    fn finds_first_replacement_only() {
        let payload = parse_object(
            r#"{"updates": [{"replacement": "first"}, {"replacement": "second"}]}"#,
        )
        .unwrap();
        assert_eq!(first_replacement(&payload), Some(&json!("first")));
    }

    #[test]
    fn missing_replacement_yields_none() {
        for text in [
            r#"{"updates": []}"#,
            r#"{"updates": "nope"}"#,
            r#"{"updates": [{"pattern": ".*"}]}"#,
            r#"{"updates": ["string"]}"#,
            r#"{"other": 1}"#,
        ] {
            let payload = parse_object(text).unwrap();
            assert!(first_replacement(&payload).is_none(), "{text}");
        }
    }

    #[test]
    fn extracts_code_language() {
        assert_eq!(code_language("code/python"), Some("python"));
        assert_eq!(code_language("code/"), Some(""));
        assert_eq!(code_language("document"), None);
    }

    #[test]
    fn fences_with_and_without_language() {
        assert_eq!(fence("rust", "fn main() {}"), "```rust\nfn main() {}\n```");
        assert_eq!(fence("", "text"), "```\ntext\n```");
    }

    #[test]
    fn pretty_prints_with_two_space_indent() {
        assert_eq!(pretty(&json!({"a": [1]})), "{\n  \"a\": [\n    1\n  ]\n}");
    }

    #[test]
    fn truthiness_follows_json_emptiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy}");
        }
        for truthy in [json!(true), json!(0.5), json!("x"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{truthy}");
        }
    }

    #[test]
    fn displays_strings_unquoted() {
        assert_eq!(display(&json!("hi")), "hi");
        assert_eq!(display(&json!(3)), "3");
        assert_eq!(display(&json!(null)), "null");
        assert_eq!(display(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }
}
