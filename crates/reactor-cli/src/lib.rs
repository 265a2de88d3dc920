// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Reactor CLI library.
//!
//! This crate provides the command-line interface for reactor components:
//! compiling a component source to its template and serving the round-trip
//! endpoint the runtime talks to.
//!
//! # Usage
//!
//! This crate is primarily used through the `reactor` binary:
//!
//! ```bash
//! reactor compile components/Counter.html --server-var count
//! reactor serve --port 3000
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `reactor.toml` at the project root.

/// CLI commands (compile, serve).
pub mod commands;
/// Project configuration from `reactor.toml`.
pub mod config;
/// Round-trip HTTP server.
pub mod server;
