// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Message extraction from a conversation `mapping` tree.
//!
//! ChatGPT stores a conversation as a graph of nodes keyed by id. Each node
//! names its parent, lists its children, and optionally carries a message.
//! Edited prompts and regenerated answers become sibling branches.
//!
//! [`extract`] walks the graph depth-first from every root (a node without a
//! parent), in mapping order, and emits one [`Message`] per visible node.
//! Hidden messages (typically system prompts) are skipped but their children
//! are still walked.

use crate::embedded::{self, display, get_str, is_truthy, pretty};
use crate::parser::{Canvas, Content, Message};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

const HIDDEN_FLAG: &str = "is_visually_hidden_from_conversation";

/// A node in the conversation mapping.
///
/// Fields are read independently: a field of the wrong shape falls back to
/// its default instead of discarding the whole node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawNode {
    /// The parent node id; `None` for roots.
    pub parent: Option<Value>,
    /// Child node ids, in display order. Entries that are not strings are skipped.
    #[serde(deserialize_with = "child_ids")]
    pub children: Vec<String>,
    /// The message stored at this node, if any.
    #[serde(deserialize_with = "lenient")]
    pub message: Option<RawMessage>,
}

/// A message as stored in the mapping.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    /// The message author.
    #[serde(deserialize_with = "lenient")]
    pub author: Option<Author>,
    /// The content object, tagged by `content_type`, or a bare string.
    /// A missing key reads as an empty object.
    #[serde(default = "empty_object")]
    pub content: Value,
    /// Arbitrary metadata (citations, visibility flags, ...).
    #[serde(deserialize_with = "lenient")]
    pub metadata: Option<Map<String, Value>>,
    /// Creation time in seconds since the Unix epoch.
    #[serde(deserialize_with = "lenient")]
    pub create_time: Option<f64>,
}

/// The author of a [`RawMessage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Author {
    /// The author role (`user`, `assistant`, `system`, `tool`).
    #[serde(deserialize_with = "lenient")]
    pub role: Option<String>,
}

/// Reads a field best-effort; a value of the wrong shape becomes the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_else(|err| {
        debug!(error = %err, "ignoring malformed field");
        T::default()
    }))
}

fn child_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Extracts the ordered, visible messages from a conversation mapping.
///
/// Traversal is a depth-first pre-order walk from each root, following each
/// node's `children` in order. Every node is processed at most once, even if
/// several parents list it. Messages without a role or with blank content
/// are dropped.
#[must_use]
pub fn extract(mapping: &Map<String, Value>) -> Vec<Message> {
    let nodes: Vec<(&str, RawNode)> = mapping
        .iter()
        .map(|(id, value)| (id.as_str(), read_node(id, value)))
        .collect();
    let index: HashMap<&str, &RawNode> = nodes.iter().map(|(id, node)| (*id, node)).collect();

    let mut visited = HashSet::new();
    let mut messages = Vec::new();

    for (root_id, _) in nodes.iter().filter(|(_, node)| node.parent.is_none()) {
        // Explicit stack; children are pushed in reverse so the first child is visited first.
        let mut stack = vec![*root_id];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = index.get(id) else {
                debug!(node = id, "child id missing from mapping");
                continue;
            };

            if let Some(raw) = &node.message
                && let Some(message) = normalize_message(id, raw)
            {
                messages.push(message);
            }

            stack.extend(node.children.iter().rev().map(String::as_str));
        }
    }

    debug!(nodes = nodes.len(), messages = messages.len(), "extracted mapping");
    messages
}

fn read_node(id: &str, value: &Value) -> RawNode {
    RawNode::deserialize(value).unwrap_or_else(|err| {
        warn!(node = id, error = %err, "unreadable mapping node, treating as empty");
        RawNode::default()
    })
}

/// Converts a raw node message into a [`Message`], or `None` if it is hidden,
/// role-less, or blank.
fn normalize_message(id: &str, raw: &RawMessage) -> Option<Message> {
    let metadata = raw.metadata.as_ref();
    if metadata
        .and_then(|m| m.get(HIDDEN_FLAG))
        .is_some_and(is_truthy)
    {
        debug!(node = id, "skipping hidden message");
        return None;
    }

    let role = raw.author.as_ref().and_then(|a| a.role.clone());
    let (mut content, mut canvas) = derive_content(&raw.content);

    if role.as_deref() == Some("assistant") && content.trim_start().starts_with('{') {
        recover_embedded_payload(&mut content, &mut canvas);
    }

    let Some(role) = role.filter(|r| !r.is_empty()) else {
        debug!(node = id, "dropping message without role");
        return None;
    };
    if content.trim().is_empty() {
        debug!(node = id, role = %role, "dropping message with blank content");
        return None;
    }

    Some(Message {
        role: Some(role),
        content: Content::Text(content),
        canvas,
        metadata: metadata.filter(|m| !m.is_empty()).cloned(),
        create_time: raw.create_time,
    })
}

/// Derives the text for a content object, dispatching on `content_type`.
///
/// Canvas content also yields the [`Canvas`] it declares.
fn derive_content(content: &Value) -> (String, Option<Canvas>) {
    let obj = match content {
        Value::Object(obj) => obj,
        Value::String(text) => return (text.clone(), None),
        Value::Null => return (String::new(), None),
        other => return (other.to_string(), None),
    };

    let text = match get_str(obj, "content_type") {
        Some("text") if obj.contains_key("parts") => join_parts(obj.get("parts")),
        Some("canvas") => {
            let name = obj.get("name").map_or_else(|| "unnamed".to_owned(), display);
            return (format!("Canvas: {name}"), Some(Canvas::from_map(obj)));
        }
        Some("thoughts") => {
            let thoughts = format_thoughts(obj.get("thoughts"));
            if thoughts.is_empty() {
                pretty(content)
            } else {
                thoughts
            }
        }
        Some("reasoning_recap") => match get_str(obj, "content") {
            Some(recap) if !recap.is_empty() => recap.to_owned(),
            _ => pretty(content),
        },
        _ => pretty(content),
    };

    (text, None)
}

/// Concatenates text parts, skipping empty ones.
fn join_parts(parts: Option<&Value>) -> String {
    parts
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|part| is_truthy(part))
        .map(display)
        .collect()
}

/// Formats reasoning thoughts as bold summaries followed by their content.
fn format_thoughts(thoughts: Option<&Value>) -> String {
    thoughts
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|thought| {
            let summary = get_str(thought, "summary").unwrap_or_default();
            let body = thought.get("content").map(display).unwrap_or_default();
            if summary.is_empty() {
                body
            } else {
                format!("**{summary}**\n{body}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recovers a tool-call payload that the assistant emitted as literal JSON.
///
/// A Canvas declaration (`name`, `code/*` `type`, `content`) turns the message
/// into a Canvas; an update payload replaces the content with its replacement.
/// Text that does not parse is left alone.
fn recover_embedded_payload(content: &mut String, canvas: &mut Option<Canvas>) {
    let Some(payload) = embedded::parse_object(content.as_str()) else {
        return;
    };

    let is_code_canvas = payload.contains_key("name")
        && payload.contains_key("content")
        && get_str(&payload, "type").is_some_and(|t| embedded::code_language(t).is_some());

    if is_code_canvas {
        *canvas = Some(Canvas::from_map(&payload));
    } else if let Some(replacement) = embedded::first_replacement(&payload) {
        *content = match replacement {
            Value::String(text) => text.clone(),
            other => pretty(other),
        };
    }
}
