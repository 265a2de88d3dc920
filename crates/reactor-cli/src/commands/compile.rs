// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component compile command.

use std::fs;
use std::path::Path;

use anyhow::Context;
use reactor::compile;

/// Compiles the component in `file` and returns its template as JSON.
///
/// The component name defaults to the file stem.
pub fn compile_file(
    file: &Path,
    component: Option<&str>,
    server_vars: &[String],
    pretty: bool,
) -> anyhow::Result<String> {
    let source = fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    let name = match component {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a component name from {}", file.display()))?,
    };

    let template = compile(&name, &source, server_vars)?;
    let json = if pretty {
        serde_json::to_string_pretty(&template)?
    } else {
        serde_json::to_string(&template)?
    };
    Ok(json)
}

/// Runs the command, printing the template to stdout.
pub fn run(file: &Path, component: Option<&str>, server_vars: &[String], pretty: bool) -> anyhow::Result<()> {
    let json = compile_file(file, component, server_vars, pretty)?;
    println!("{}", json);
    Ok(())
}
