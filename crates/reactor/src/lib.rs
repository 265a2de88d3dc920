// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
// Error enums carry source snippets for compile diagnostics.
#![allow(clippy::result_large_err)]

//! # Reactor
//!
//! Mustache components with a Lua script, compiled once and reconciled in
//! place.
//!
//! A component source is a mustache template with at most one `<script>`
//! block (Lua) and at most one `<style>` block. The compiler turns it into a
//! [`Template`]: annotated markup that knows where every variable, section
//! and attribute came from, plus a program exposing the script's variables
//! and functions. At runtime a [`Reactor`] fetches templates and server
//! values through a [`Transport`], renders them into a [`Document`] and,
//! whenever a component function changes state, either patches the affected
//! fragments locally or re-fetches when a server variable changed.
//!
//! ## Features
//!
//! - Section, variable and attribute annotation of mustache markup
//! - Lua program synthesis with server/client variable classification
//! - Depth-gated incremental reflow
//! - A server side ([`ComponentServer`]) with an LRU template cache
//! - In-process and HTTP (feature `http`) transports
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use reactor::{
//!     ComponentDefinition, ComponentServer, Document, InProcessTransport, Mustache, Reactor,
//!     ReactorConfig,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut server = ComponentServer::new();
//! server.register(
//!     ComponentDefinition::new("Hello", "<p>Hello {{name}}</p>").with_var("name", "World"),
//! );
//!
//! let config = ReactorConfig::builder().engine(Mustache).refresh(|_| {}).build()?;
//! let document = Document::from_body("<div id=\"hello\"></div>")?;
//! let reactor = Reactor::new(config, InProcessTransport::new(Arc::new(server)), document)?;
//!
//! reactor.run("Hello", None, "hello").await?;
//! assert_eq!(reactor.document().element_by_id("hello").unwrap().text_content(), "Hello World");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

/// Whole-component compile pipeline.
pub mod compiler;
/// Script, style and markup extraction from a component source.
pub mod extract;
/// Markup grammar and tree construction.
pub mod parser;
/// Owned markup tree.
pub mod markup;
/// Mustache section and variable annotation.
pub mod annotate;
/// Lua program synthesis.
pub mod codegen;
/// Base indentation detection for script blocks.
pub mod indentation;
/// Compiled templates.
pub mod template;
/// Mustache rendering.
pub mod mustache;
/// Error types and reporting.
pub mod error;
/// Running component programs.
pub mod program;
/// Live component instances.
pub mod component;
/// Initial render and incremental reflow.
pub mod renderer;
/// Page document.
pub mod dom;
/// Host configuration.
pub mod config;
/// The orchestrator.
pub mod reactor;
/// Round-trip requests.
pub mod request;
/// Round-trip responses.
pub mod response;
/// Compiled template caching.
pub mod cache;
/// Server side of the round trip.
pub mod server;
/// Round-trip transports.
pub mod transport;

pub use annotate::{annotate, strip_annotations};
pub use cache::TemplateCache;
pub use codegen::{synthesize, Hook, Program};
pub use compiler::compile;
pub use component::{component_key, ChangeStatus, Component};
pub use config::{default_error_hook, ReactorConfig, ReactorConfigBuilder, Route};
pub use dom::Document;
pub use error::*;
pub use markup::{Element, Node};
pub use mustache::{Mustache, RenderError, TemplateEngine, VarMap};
pub use program::ProgramInstance;
pub use reactor::{Reaction, Reactor};
pub use renderer::{ChangeSet, ReflowReport, Renderer};
pub use request::{ComponentRequest, RenderMode};
pub use response::{ComponentResponse, ErrorResponse};
pub use server::{ComponentDefinition, ComponentServer};
pub use template::Template;
pub use transport::{decode_response, InProcessTransport, Transport};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Re-export mlua so hosts can share types with component programs
pub use mlua;

#[cfg(test)]
mod tests;
