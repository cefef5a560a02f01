// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert ChatGPT conversation exports to Markdown.
//!
//! This crate provides parsing and rendering functionality for transforming
//! ChatGPT's JSON conversation data, including Canvas documents and web
//! citations, into readable Markdown documents.
//!
//! # Overview
//!
//! ChatGPT exports conversations as JSON, usually as a tree of message nodes.
//! This crate:
//!
//! 1. Detects the shape of the JSON and normalizes it into an ordered list
//!    of messages, walking the message tree when there is one
//! 2. Renders the messages as Markdown with code fences, inline citations
//!    and per-message reference lists
//!
//! # Example
//!
//! ```
//! use chatgpt2md::{parser, renderer};
//!
//! let json = r#"{"messages": [
//!     {"role": "user", "content": "Hello"},
//!     {"role": "assistant", "content": "Hi!"}
//! ]}"#;
//! let messages = parser::parse_conversation(json).unwrap();
//!
//! let markdown = renderer::render_conversation(&messages, &renderer::RenderOptions::default());
//! assert!(markdown.contains("## User\n\nHello\n"));
//! ```
//!
//! # Modules
//!
//! - [`parser`]: format detection and message types
//! - [`mapping`]: message extraction from conversation trees
//! - [`renderer`]: Markdown generation with configurable output options
//! - [`citations`]: inline citation substitution and reference lists
//! - [`embedded`]: fail-open parsing of JSON payloads inside message text

#![deny(missing_docs)]

pub mod citations;
pub mod embedded;
pub mod mapping;
pub mod parser;
pub mod renderer;
