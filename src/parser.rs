// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing and format detection for ChatGPT conversation exports.
//!
//! ChatGPT data shows up in several shapes: the official export
//! (`conversations.json`, a list of conversations each holding a `mapping`
//! tree), a single conversation object, or hand-assembled lists of
//! `{role, content}` records. This module detects which shape is present and
//! normalizes it into an ordered list of [`Message`]s for the renderer.
//!
//! # Accepted Shapes
//!
//! - a list of message objects (each with `role` and `content`)
//! - a list whose first element has a `mapping` (only that element is used)
//! - an object with a `mapping` tree
//! - an object with a `messages` list
//! - a single message object
//! - an object whose values are all message objects
//!
//! Anything else yields an empty message list.
//!
//! # Example
//!
//! ```
//! use chatgpt2md::parser::{Content, parse_conversation};
//!
//! let json = r#"{"messages": [
//!     {"role": "user", "content": "Hello"},
//!     {"role": "assistant", "content": "Hi!"}
//! ]}"#;
//!
//! let messages = parse_conversation(json).unwrap();
//! assert_eq!(messages.len(), 2);
//! assert_eq!(messages[0].role.as_deref(), Some("user"));
//! assert_eq!(messages[1].content, Content::Text("Hi!".into()));
//! ```

use crate::embedded::{display, get_str};
use crate::mapping;
use serde_json::{Map, Value, json};
use snafu::prelude::*;
use tracing::{debug, warn};

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// A normalized conversation message, ready for rendering.
///
/// Messages come either from the mapping extractor or directly from
/// pass-through records in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The author role (`user`, `assistant`, `system`, `tool`, ...).
    ///
    /// Records without a role render as `assistant`.
    pub role: Option<String>,

    /// The message body.
    pub content: Content,

    /// An embedded Canvas document. When present, the message renders as a
    /// Canvas section and `content` is ignored.
    pub canvas: Option<Canvas>,

    /// Message metadata, used for citations and references.
    pub metadata: Option<Map<String, Value>>,

    /// Creation time in seconds since the Unix epoch.
    pub create_time: Option<f64>,
}

/// The body of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text. May itself contain an embedded JSON payload.
    Text(String),

    /// A list of parts, concatenated without separator when rendered.
    Parts(Vec<Value>),

    /// An object carrying a `type` tag and inner `content`.
    ///
    /// `code/<lang>` types render as fenced code blocks.
    Typed {
        /// The type tag, e.g. `code/python` or `document`.
        kind: String,
        /// The inner content.
        content: Value,
    },

    /// Any other JSON value, rendered as a fenced JSON block.
    Other(Value),
}

/// An embedded Canvas document (code or prose).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    /// Display name, e.g. `main.py`.
    pub name: String,
    /// Type tag: `code/<lang>` for code, anything else for documents.
    pub kind: String,
    /// The document body.
    pub content: String,
}

impl Content {
    /// Classifies a raw JSON content value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::Parts(items),
            Value::Object(map) => {
                if let (Some(kind), Some(content)) =
                    (get_str(&map, "type"), map.get("content"))
                {
                    return Self::Typed {
                        kind: kind.to_owned(),
                        content: content.clone(),
                    };
                }
                Self::Other(Value::Object(map))
            }
            other => Self::Other(other),
        }
    }

    /// Returns the content as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Parts(items) => Value::Array(items.clone()),
            Self::Typed { kind, content } => json!({ "type": kind, "content": content }),
            Self::Other(value) => value.clone(),
        }
    }
}

impl Canvas {
    /// Reads a Canvas from its JSON object form (`name`, `type`, `content`).
    ///
    /// Missing fields default to `untitled`, `document`, and empty content.
    #[must_use]
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let field = |key: &str, default: &str| {
            map.get(key)
                .map_or_else(|| default.to_owned(), display)
        };
        Self {
            name: field("name", "untitled"),
            kind: field("type", "document"),
            content: field("content", ""),
        }
    }
}

impl Message {
    /// Converts a pass-through message record.
    ///
    /// Returns `None` if the record is not a JSON object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let canvas = (get_str(obj, "type") == Some("canvas")).then(|| {
            obj.get("canvas")
                .and_then(Value::as_object)
                .map_or_else(|| Canvas::from_map(&Map::new()), Canvas::from_map)
        });

        let content = obj
            .get("content")
            .map_or_else(|| Content::Text(String::new()), |c| Content::from_value(c.clone()));

        Some(Self {
            role: get_str(obj, "role").map(str::to_owned),
            content,
            canvas,
            metadata: obj.get("metadata").and_then(Value::as_object).cloned(),
            create_time: obj.get("create_time").and_then(Value::as_f64),
        })
    }
}

/// Parses a JSON string into an ordered list of [`Message`]s.
///
/// This is the main entry point for parsing ChatGPT exports.
///
/// # Errors
///
/// Returns an error only if the text is not valid JSON. Valid JSON in an
/// unrecognized shape yields an empty list.
///
/// # Example
///
/// ```
/// use chatgpt2md::parser::parse_conversation;
///
/// assert!(parse_conversation("42").unwrap().is_empty());
/// assert!(parse_conversation("{oops").is_err());
/// ```
pub fn parse_conversation(json_str: &str) -> Result<Vec<Message>, ParseError> {
    let data: Value = serde_json::from_str(json_str).context(JsonSnafu)?;
    Ok(messages_from_value(&data))
}

/// Detects the shape of an already-parsed export and extracts its messages.
#[must_use]
pub fn messages_from_value(data: &Value) -> Vec<Message> {
    match data {
        Value::Array(items) => match items.first().and_then(Value::as_object) {
            Some(first) if first.contains_key("mapping") => {
                debug!(
                    conversations = items.len(),
                    "detected conversation list, using the first conversation"
                );
                messages_from_mapping(first.get("mapping"))
            }
            Some(first) if has_role_and_content(first) => {
                debug!(records = items.len(), "detected message list");
                messages_from_records(items)
            }
            _ => unrecognized(),
        },
        Value::Object(obj) => {
            if obj.contains_key("mapping") {
                debug!("detected conversation with mapping");
                messages_from_mapping(obj.get("mapping"))
            } else if let Some(records) = obj.get("messages").and_then(Value::as_array) {
                debug!(records = records.len(), "detected messages field");
                messages_from_records(records)
            } else if has_role_and_content(obj) {
                debug!("detected single message");
                Message::from_value(data).into_iter().collect()
            } else if obj
                .values()
                .all(|v| v.as_object().is_some_and(|m| m.contains_key("role")))
            {
                debug!(records = obj.len(), "detected keyed message map");
                messages_from_records(obj.values())
            } else {
                unrecognized()
            }
        }
        _ => unrecognized(),
    }
}

fn has_role_and_content(obj: &Map<String, Value>) -> bool {
    obj.contains_key("role") && obj.contains_key("content")
}

fn messages_from_mapping(mapping: Option<&Value>) -> Vec<Message> {
    if let Some(mapping) = mapping.and_then(Value::as_object) {
        mapping::extract(mapping)
    } else {
        warn!("mapping field is not an object, no messages extracted");
        Vec::new()
    }
}

fn messages_from_records<'a>(records: impl IntoIterator<Item = &'a Value>) -> Vec<Message> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let message = Message::from_value(record);
            if message.is_none() {
                warn!(index, "skipping message record that is not an object");
            }
            message
        })
        .collect()
}

fn unrecognized() -> Vec<Message> {
    debug!("unrecognized export shape, no messages extracted");
    Vec::new()
}
