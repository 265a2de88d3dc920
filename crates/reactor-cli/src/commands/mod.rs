// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `compile`: Compile one component source and print the template
//! - `serve`: Serve the round-trip endpoint

/// Component compile command.
pub mod compile;
/// Round-trip server command.
pub mod serve;
