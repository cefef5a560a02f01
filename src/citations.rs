// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Citation substitution and per-message reference lists.
//!
//! Web-browsing answers carry `content_references` in their metadata. Each
//! reference names the literal marker text it annotates (`matched_text`), a
//! Markdown replacement for it (`alt`), and the source items it cites.
//! Search results may also appear under `search_result_groups`.
//!
//! References are scoped to a single message: they are collected, rendered
//! directly below that message, and discarded.

use crate::embedded::{display, get_str};
use serde_json::{Map, Value};
use std::fmt::Write;

/// Snippets longer than this many characters are truncated.
const SNIPPET_LIMIT: usize = 200;

/// A cited source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationRef {
    /// Page title.
    pub title: String,
    /// Source URL.
    pub url: String,
    /// Publisher or site name.
    pub attribution: String,
    /// Excerpt from the source.
    pub snippet: String,
}

impl CitationRef {
    /// Reads a citation from a source item.
    ///
    /// Returns `None` unless the item is an object with both `title` and `url`.
    #[must_use]
    pub fn from_item(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;
        if !(obj.contains_key("title") && obj.contains_key("url")) {
            return None;
        }
        let field = |key: &str| match obj.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(value) => display(value),
        };
        Some(Self {
            title: field("title"),
            url: field("url"),
            attribution: field("attribution"),
            snippet: field("snippet"),
        })
    }
}

/// Applies inline citation substitutions and collects the cited sources.
///
/// Every `content_references` entry with a non-empty `matched_text` (other
/// than `sources_footnote` entries) has each literal occurrence of that text
/// replaced by its `alt` text. Source items from those entries and from
/// `search_result_groups` are collected in order, without duplicates.
#[must_use]
pub fn process(content: &str, metadata: &Map<String, Value>) -> (String, Vec<CitationRef>) {
    let mut text = content.to_owned();
    let mut references = Vec::new();

    for reference in array_field(metadata, "content_references").filter_map(Value::as_object) {
        let matched = get_str(reference, "matched_text").unwrap_or_default();
        if matched.is_empty() || get_str(reference, "type") == Some("sources_footnote") {
            continue;
        }

        if let Some(alt) = get_str(reference, "alt")
            && !alt.is_empty()
            && text.contains(matched)
        {
            text = text.replace(matched, alt);
        }

        for item in array_field(reference, "items") {
            push_unique(&mut references, CitationRef::from_item(item));
        }
    }

    for group in array_field(metadata, "search_result_groups").filter_map(Value::as_object) {
        for entry in array_field(group, "entries") {
            push_unique(&mut references, CitationRef::from_item(entry));
        }
    }

    (text, references)
}

/// Formats a numbered References section under the given heading prefix.
///
/// Returns an empty string when there are no references.
#[must_use]
pub fn format_references(references: &[CitationRef], heading: &str) -> String {
    if references.is_empty() {
        return String::new();
    }

    let mut out = format!("\n{heading} References\n");
    for (i, reference) in references.iter().enumerate() {
        write!(out, "\n{}\n", format_entry(i + 1, reference)).unwrap();
    }
    out
}

fn format_entry(number: usize, reference: &CitationRef) -> String {
    let title = if reference.title.is_empty() {
        "Untitled"
    } else {
        reference.title.as_str()
    };
    let mut line = format!("{number}. **{title}**");

    if !reference.attribution.is_empty() {
        write!(line, " - {}", reference.attribution).unwrap();
    }
    if !reference.url.is_empty() {
        write!(line, "  \n   [{0}]({0})", reference.url).unwrap();
    }
    if !reference.snippet.is_empty() {
        write!(line, "  \n   _{}_", truncate_snippet(&reference.snippet)).unwrap();
    }
    line
}

fn truncate_snippet(snippet: &str) -> String {
    match snippet.char_indices().nth(SNIPPET_LIMIT) {
        Some((cut, _)) => format!("{}...", &snippet[..cut]),
        None => snippet.to_owned(),
    }
}

fn push_unique(references: &mut Vec<CitationRef>, candidate: Option<CitationRef>) {
    if let Some(candidate) = candidate
        && !references.contains(&candidate)
    {
        references.push(candidate);
    }
}

fn array_field<'a>(map: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    map.get(key).and_then(Value::as_array).into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {other:?}"),
        }
    }

    fn item(title: &str, url: &str) -> Value {
        json!({"title": title, "url": url, "attribution": "Example", "snippet": "A snippet"})
    }

    #[test]
    fn replaces_matched_text_with_alt() {
        let meta = metadata(json!({
            "content_references": [{
                "matched_text": "\u{e200}cite\u{e202}turn0search0\u{e201}",
                "alt": "([Example](https://example.com))",
                "items": [item("Example page", "https://example.com")]
            }]
        }));
        let content = "Rust is fast \u{e200}cite\u{e202}turn0search0\u{e201}.";

        let (text, refs) = process(content, &meta);

        assert_eq!(text, "Rust is fast ([Example](https://example.com)).");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].title, "Example page");
        assert_eq!(refs[0].attribution, "Example");
    }

    #[test]
    fn replaces_every_occurrence_literally() {
        let meta = metadata(json!({
            "content_references": [{"matched_text": "[1]", "alt": "(src)"}]
        }));

        let (text, _) = process("a [1] b [1]", &meta);

        assert_eq!(text, "a (src) b (src)");
    }

    #[test]
    fn skips_footnotes_and_empty_matches() {
        let meta = metadata(json!({
            "content_references": [
                {"matched_text": "X", "alt": "footnote", "type": "sources_footnote",
                 "items": [item("Skipped", "https://skip.example")]},
                {"matched_text": "", "alt": "empty",
                 "items": [item("Also skipped", "https://skip2.example")]}
            ]
        }));

        let (text, refs) = process("X marks", &meta);

        assert_eq!(text, "X marks");
        assert!(refs.is_empty());
    }

    #[test]
    fn keeps_text_when_alt_missing_but_collects_items() {
        let meta = metadata(json!({
            "content_references": [{
                "matched_text": "[cite]",
                "items": [item("Source", "https://source.example")]
            }]
        }));

        let (text, refs) = process("See [cite]", &meta);

        assert_eq!(text, "See [cite]");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn deduplicates_identical_items() {
        let meta = metadata(json!({
            "content_references": [
                {"matched_text": "a", "items": [item("Same", "https://same.example")]},
                {"matched_text": "b", "items": [item("Same", "https://same.example")]}
            ],
            "search_result_groups": [
                {"entries": [item("Same", "https://same.example"), item("Other", "https://other.example")]}
            ]
        }));

        let (_, refs) = process("a b", &meta);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "Same");
        assert_eq!(refs[1].title, "Other");
    }

    #[test]
    fn items_differing_in_one_field_are_distinct() {
        let mut second = item("Same", "https://same.example");
        second["snippet"] = json!("Different");
        let meta = metadata(json!({
            "search_result_groups": [{"entries": [item("Same", "https://same.example"), second]}]
        }));

        let (_, refs) = process("", &meta);

        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn ignores_items_without_title_or_url() {
        let meta = metadata(json!({
            "content_references": [{
                "matched_text": "m",
                "items": [{"title": "No url"}, {"url": "https://no-title.example"}, "junk"]
            }],
            "search_result_groups": [{"entries": [{"title": "No url"}]}, "junk", {"domain": "x"}]
        }));

        let (_, refs) = process("m", &meta);

        assert!(refs.is_empty());
    }

    #[test]
    fn substitution_is_idempotent() {
        let meta = metadata(json!({
            "content_references": [{
                "matched_text": "[c]",
                "alt": "(link)",
                "items": [item("T", "https://t.example")]
            }]
        }));

        let (once, first_refs) = process("x [c] y", &meta);
        let (twice, second_refs) = process(&once, &meta);

        assert_eq!(once, twice);
        assert_eq!(first_refs, second_refs);
    }

    #[test]
    fn formats_reference_section() {
        let refs = vec![
            CitationRef {
                title: "Rust".into(),
                url: "https://rust-lang.org".into(),
                attribution: "rust-lang.org".into(),
                snippet: "A language".into(),
            },
            CitationRef {
                url: "https://bare.example".into(),
                ..Default::default()
            },
        ];

        let section = format_references(&refs, "##");

        assert_eq!(
            section,
            "\n## References\n\
             \n1. **Rust** - rust-lang.org  \n   [https://rust-lang.org](https://rust-lang.org)  \n   _A language_\n\
             \n2. **Untitled**  \n   [https://bare.example](https://bare.example)\n"
        );
    }

    #[test]
    fn empty_references_format_to_nothing() {
        assert_eq!(format_references(&[], "##"), "");
    }

    #[test]
    fn truncates_long_snippets() {
        let long = "é".repeat(250);
        let truncated = truncate_snippet(&long);

        assert_eq!(truncated.chars().count(), SNIPPET_LIMIT + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_snippet(&"a".repeat(200)), "a".repeat(200));
    }
}
