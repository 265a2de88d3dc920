// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component discovery.
//!
//! Every `*.html` file below the components directory is a component. Its
//! name is the relative path without extension, directories joined with `_`
//! (`admin/Panel.html` is `admin_Panel`). A sibling `Name.toml` may declare
//! the server variables with their initial values:
//!
//! ```toml
//! [vars]
//! count = 0
//! title = "Hello"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use reactor::{ComponentDefinition, ComponentServer, TemplateCache, VarMap};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ComponentManifest {
    #[serde(default)]
    vars: VarMap,
}

/// Loads component definitions from a directory.
#[derive(Debug, Clone)]
pub struct ComponentLoader {
    root: PathBuf,
}

impl ComponentLoader {
    /// Creates a loader over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The components directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Component name of the file at `path`, if it lies below the root.
    pub fn component_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("_"))
        }
    }

    /// Reads every component below the root, sorted by path.
    pub fn discover(&self) -> anyhow::Result<Vec<ComponentDefinition>> {
        if !self.root.is_dir() {
            tracing::warn!(dir = %self.root.display(), "components directory not found");
            return Ok(Vec::new());
        }

        let pattern = self.root.join("**").join("*.html");
        let pattern = pattern.to_string_lossy();
        let mut definitions = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            definitions.push(self.load(&path)?);
        }
        Ok(definitions)
    }

    /// Reads the component at `path` and its manifest.
    pub fn load(&self, path: &Path) -> anyhow::Result<ComponentDefinition> {
        let name = self
            .component_name(path)
            .with_context(|| format!("{} is outside {}", path.display(), self.root.display()))?;
        let source = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;

        let manifest_path = path.with_extension("toml");
        let manifest = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            toml::from_str::<ComponentManifest>(&content)
                .with_context(|| format!("invalid manifest {}", manifest_path.display()))?
        } else {
            ComponentManifest::default()
        };

        tracing::debug!(component = %name, vars = manifest.vars.len(), "loaded component");
        Ok(ComponentDefinition::new(name, source).with_vars(manifest.vars))
    }

    /// Builds a server holding every component, compiling through `cache`.
    pub fn load_server(&self, cache: &TemplateCache) -> anyhow::Result<ComponentServer> {
        let mut server = ComponentServer::new().with_cache(cache.clone());
        for definition in self.discover()? {
            server.register(definition);
        }
        Ok(server)
    }
}
