// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Integration tests for chatgpt2md parsing and rendering.

use chatgpt2md::{parser, renderer};
use std::fs;
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn convert(json: &str) -> String {
    let messages = parser::parse_conversation(json).unwrap();
    renderer::render_conversation(&messages, &renderer::RenderOptions::default())
}

/// Renders every fixture export and compares it with its expected Markdown.
#[test]
fn renders_all_fixtures_as_expected() {
    let mut checked = 0;
    for entry in fs::read_dir(fixtures_dir()).expect("Failed to read fixtures directory") {
        let path = entry.expect("Failed to read directory entry").path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let json = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
        let expected_path = path.with_extension("md");
        let expected = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {e}", expected_path.display()));

        assert_eq!(
            convert(&json),
            expected,
            "Unexpected markdown for {}",
            path.display()
        );
        checked += 1;
    }
    assert!(checked >= 2, "Expected at least two fixtures, found {checked}");
}

/// The message-list round trip keeps order and role headings.
#[test]
fn messages_field_round_trip() {
    let output = convert(
        r#"{"messages":[{"role":"user","content":"Hello"},{"role":"assistant","content":"Hi!"}]}"#,
    );

    let user = output.find("## User\n\nHello\n").expect("User section");
    let assistant = output.find("## Assistant\n\nHi!\n").expect("Assistant section");
    assert!(user < assistant);
}

/// An embedded replacement with code and language renders as that code.
#[test]
fn replacement_payload_renders_as_code_block() {
    let output = convert(
        r#"[{"role": "assistant", "content": "{\"updates\":[{\"replacement\":{\"code\":\"print(1)\",\"language\":\"python\"}}]}"}]"#,
    );

    assert!(output.contains("```python\nprint(1)\n```"));
    assert!(!output.contains("updates"));
}

/// Unrecognized shapes produce only the title.
#[test]
fn unrecognized_shape_renders_title_only() {
    assert_eq!(convert("42"), "# ChatGPT Conversation\n");
    assert_eq!(convert(r#"{"unrelated": true}"#), "# ChatGPT Conversation\n");
}

/// Malformed JSON is an error, not an empty document.
#[test]
fn malformed_json_is_an_error() {
    let err = parser::parse_conversation(r#"{"messages": [}"#).unwrap_err();
    assert!(err.to_string().starts_with("failed to parse JSON"));
}

/// Hidden system prompts are omitted while their replies remain.
#[test]
fn hidden_tree_nodes_are_transparent() {
    let json = r#"{"mapping": {
        "sys": {"parent": null, "children": ["u"], "message": {
            "author": {"role": "system"},
            "content": {"content_type": "text", "parts": ["secret prompt"]},
            "metadata": {"is_visually_hidden_from_conversation": true}
        }},
        "u": {"parent": "sys", "children": [], "message": {
            "author": {"role": "user"},
            "content": {"content_type": "text", "parts": ["visible question"]},
            "metadata": {}
        }}
    }}"#;

    let messages = parser::parse_conversation(json).unwrap();
    assert_eq!(messages.len(), 1);

    let output = renderer::render_conversation(&messages, &renderer::RenderOptions::default());
    assert!(!output.contains("secret prompt"));
    assert!(!output.contains("## System"));
    assert!(output.contains("## User\n\nvisible question\n"));
}

/// Timestamps from the mapping are shown when requested.
#[test]
fn tree_timestamps_rendered_when_enabled() {
    let json = fs::read_to_string(fixtures_dir().join("conversation_export.json")).unwrap();
    let messages = parser::parse_conversation(&json).unwrap();

    let opts = renderer::RenderOptions {
        show_timestamps: true,
        ..Default::default()
    };
    let output = renderer::render_conversation(&messages, &opts);

    assert!(
        output.contains("## User\n\n*2024-12-05 00:00 UTC*\n\nHow do I sort a list in Python?"),
        "Timestamp should follow the user heading"
    );
}
