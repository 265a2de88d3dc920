// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Round-trip server components.
//!
//! - `http`: HTTP server using Axum
//! - `loader`: Component discovery from the components directory

/// HTTP server implementation using Axum.
pub mod http;
/// Component discovery and loading.
pub mod loader;
