// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for parsed ChatGPT conversations.
//!
//! This module transforms a list of [`Message`]s into a Markdown document.
//!
//! # Output Format
//!
//! The rendered Markdown includes:
//! - A top-level `# ChatGPT Conversation` heading
//! - A `## User`, `## Assistant`, `## System` (or capitalized role) section
//!   per message, in input order
//! - A `###` section per Canvas, fenced when the Canvas holds code
//! - A `## References` list directly below any message that cites sources
//!
//! # Example
//!
//! ```
//! use chatgpt2md::parser::parse_conversation;
//! use chatgpt2md::renderer::{render_conversation, RenderOptions};
//!
//! let messages = parse_conversation(
//!     r#"[{"role": "user", "content": "Hello!"}, {"role": "assistant", "content": "Hi there!"}]"#,
//! )
//! .unwrap();
//!
//! let markdown = render_conversation(&messages, &RenderOptions::default());
//!
//! assert!(markdown.starts_with("# ChatGPT Conversation\n"));
//! assert!(markdown.contains("## User\n\nHello!\n"));
//! assert!(markdown.contains("## Assistant\n\nHi there!\n"));
//! ```

use crate::citations::{self, CitationRef};
use crate::embedded::{self, code_language, display, fence, is_truthy, pretty};
use crate::parser::{Canvas, Content, Message};
use chrono::DateTime;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Number of messages listed in [`debug_summary`].
const SUMMARY_MESSAGES: usize = 5;

/// Characters of content shown per message in [`debug_summary`].
const SUMMARY_PREVIEW: usize = 50;

/// Configuration options for Markdown rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Whether to show message creation times under message headings.
    ///
    /// Only messages that carry a `create_time` are annotated.
    pub show_timestamps: bool,

    /// Number of heading levels to shift (0-5).
    ///
    /// A value of 0 produces H1/H2/H3 headings (default).
    /// A value of 1 produces H2/H3/H4 headings, useful for embedding.
    pub heading_offset: u8,
}

/// Returns a markdown heading prefix with the given level and offset.
///
/// The heading level is clamped to a maximum of 6 (H6).
fn heading(level: u8, offset: u8) -> String {
    let actual = level.saturating_add(offset).min(6);
    "#".repeat(actual as usize)
}

/// Renders a list of messages as Markdown.
///
/// Messages are rendered in order. Canvas messages become their own
/// sections; all others become role sections followed, when they cite
/// sources, by a References list.
#[must_use]
pub fn render_conversation(messages: &[Message], opts: &RenderOptions) -> String {
    let mut out = String::new();
    writeln!(out, "{} ChatGPT Conversation", heading(1, opts.heading_offset)).unwrap();

    for message in messages {
        match &message.canvas {
            Some(canvas) => render_canvas(&mut out, canvas, opts),
            None => render_message(&mut out, message, opts),
        }
    }

    out
}

fn render_canvas(out: &mut String, canvas: &Canvas, opts: &RenderOptions) {
    let h = heading(3, opts.heading_offset);
    match code_language(&canvas.kind) {
        Some(lang) => {
            writeln!(out, "\n{h} {} - Code ({lang})\n", canvas.name).unwrap();
            writeln!(out, "{}", fence(lang, &canvas.content)).unwrap();
        }
        None => {
            writeln!(out, "\n{h} {}\n", canvas.name).unwrap();
            writeln!(out, "{}", canvas.content).unwrap();
        }
    }
}

fn render_message(out: &mut String, message: &Message, opts: &RenderOptions) {
    let role = message.role.as_deref().unwrap_or("assistant");
    let content = normalize_content(&message.content);

    let (content, references) = match &message.metadata {
        Some(metadata) if !metadata.is_empty() => citations::process(&content, metadata),
        _ => (content, Vec::new()),
    };

    writeln!(
        out,
        "\n{} {}\n",
        heading(2, opts.heading_offset),
        role_header(role)
    )
    .unwrap();
    if opts.show_timestamps
        && let Some(timestamp) = message.create_time.and_then(format_timestamp)
    {
        writeln!(out, "*{timestamp}*\n").unwrap();
    }
    writeln!(out, "{content}").unwrap();

    render_references(out, &references, opts);
}

fn render_references(out: &mut String, references: &[CitationRef], opts: &RenderOptions) {
    if references.is_empty() {
        return;
    }
    let section = citations::format_references(references, &heading(2, opts.heading_offset));
    writeln!(out, "\n{section}").unwrap();
}

/// Maps a role to its section title.
///
/// Known roles use fixed titles; others are capitalized.
fn role_header(role: &str) -> String {
    match role {
        "user" => "User".to_owned(),
        "assistant" => "Assistant".to_owned(),
        "system" => "System".to_owned(),
        other => capitalize(other),
    }
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

#[allow(clippy::cast_possible_truncation)]
fn format_timestamp(seconds: f64) -> Option<String> {
    DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Converts message content to Markdown text.
///
/// Typed code content is fenced. Text that holds an embedded update payload
/// is unwrapped. Lists are concatenated. Anything else is shown as JSON.
fn normalize_content(content: &Content) -> String {
    match content {
        Content::Text(text) => normalize_text(text),
        Content::Parts(items) => items.iter().map(display).collect(),
        Content::Typed { kind, content } => match code_language(kind) {
            Some(lang) => fence(lang, &display(content)),
            None => normalize_value(content),
        },
        Content::Other(value) => fence("json", &pretty(value)),
    }
}

fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(text) => normalize_text(text),
        Value::Array(items) => items.iter().map(display).collect(),
        other => fence("json", &pretty(other)),
    }
}

/// Unwraps an embedded update payload, leaving any other text unchanged.
fn normalize_text(text: &str) -> String {
    if !embedded::looks_like_object(text) {
        return text.to_owned();
    }
    embedded::parse_object(text)
        .and_then(|payload| {
            let replacement = embedded::first_replacement(&payload)?;
            render_replacement(replacement, &payload)
        })
        .unwrap_or_else(|| text.to_owned())
}

/// Renders an update's replacement as a fenced block.
///
/// The language is chosen, in order, from the replacement's `code` and
/// `language` fields, its `type` tag, or the `type` of the payload's last
/// typed content reference. Returns `None` for type tags that are not
/// strings, leaving the original text in place.
fn render_replacement(replacement: &Value, payload: &Map<String, Value>) -> Option<String> {
    if let Value::Object(fields) = replacement {
        if let (Some(code), Some(lang)) = (fields.get("code"), fields.get("language")) {
            return Some(fence(&display(lang), &display(code)));
        }
        if let Some(kind) = fields.get("type") {
            let kind = kind.as_str()?;
            return Some(match code_language(kind) {
                Some(lang) => {
                    let code = fields.get("content").map(display).unwrap_or_default();
                    fence(lang, &code)
                }
                None => fence("json", &pretty(replacement)),
            });
        }
    }

    if let Some(kind) = referenced_type(payload) {
        let kind = kind.as_str()?;
        if let Some(lang) = code_language(kind) {
            let body = match replacement {
                Value::String(text) => text.clone(),
                other => pretty(other),
            };
            return Some(fence(lang, &body));
        }
    }

    Some(match replacement {
        Value::Object(_) => fence("json", &pretty(replacement)),
        Value::String(text) => fence("", text),
        other => fence("", &display(other)),
    })
}

/// Returns the `type` of the last typed entry in `content_references`,
/// ignoring empty values.
fn referenced_type(payload: &Map<String, Value>) -> Option<&Value> {
    payload
        .get("content_references")?
        .as_array()?
        .iter()
        .rev()
        .filter_map(Value::as_object)
        .find_map(|reference| reference.get("type"))
        .filter(|kind| is_truthy(kind))
}

/// Summarizes parsed messages for diagnostics.
///
/// Lists the message count and a short preview of the first few messages.
#[must_use]
pub fn debug_summary(messages: &[Message]) -> String {
    let mut out = String::new();
    writeln!(out, "Found {} messages:", messages.len()).unwrap();

    for (i, message) in messages.iter().take(SUMMARY_MESSAGES).enumerate() {
        let role = message.role.as_deref().unwrap_or("unknown");
        writeln!(out, "{}: {role} - {}", i + 1, preview(&message.content)).unwrap();
    }
    if messages.len() > SUMMARY_MESSAGES {
        writeln!(out, "... and {} more", messages.len() - SUMMARY_MESSAGES).unwrap();
    }

    out
}

fn preview(content: &Content) -> String {
    match content {
        Content::Text(text) if text.chars().count() <= SUMMARY_PREVIEW => text.clone(),
        Content::Text(text) => format!("{}...", truncate_chars(text, SUMMARY_PREVIEW)),
        other => format!(
            "{}...",
            truncate_chars(&other.to_value().to_string(), SUMMARY_PREVIEW)
        ),
    }
}

fn truncate_chars(s: &str, limit: usize) -> &str {
    s.char_indices().nth(limit).map_or(s, |(cut, _)| &s[..cut])
}
