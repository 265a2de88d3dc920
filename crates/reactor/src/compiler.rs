// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The template compiler pipeline.
//!
//! ```text
//! source ──extract──► script ──synthesize──► program
//!                  └► markup ──annotate────► annotated markup
//! ```
//!
//! The script is synthesized before the markup is parsed, so declaration
//! errors win over markup errors.

use crate::annotate::annotate;
use crate::codegen::synthesize;
use crate::error::CompileError;
use crate::extract::extract;
use crate::template::Template;

/// Compiles one component template.
///
/// `server_vars` are the names whose values the server supplies; the identity
/// variables are always added.
pub fn compile(component: &str, source: &str, server_vars: &[String]) -> Result<Template, CompileError> {
    let parts = extract(component, source)?;
    let program = synthesize(component, &parts.script, server_vars)?;
    let markup = annotate(component, &parts.markup, &program.functions)?;

    tracing::debug!(component, "compiled template");
    Ok(Template::new(component, program.source, parts.style, markup))
}
