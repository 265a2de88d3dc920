// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server side of the round trip.
//!
//! A [`ComponentServer`] holds the registered [`ComponentDefinition`]s and
//! answers [`ComponentRequest`]s: posted values are merged over the
//! defaults, the optional server hook runs, and the template is compiled
//! through the [`TemplateCache`].

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::cache::TemplateCache;
use crate::codegen::{COMPONENT_VAR, ID_VAR};
use crate::error::ServerError;
use crate::mustache::{Mustache, VarMap};
use crate::request::{ComponentRequest, RenderMode};
use crate::response::{ComponentResponse, ErrorResponse};

/// Server-side logic of a component, run on every request.
pub type RunHook = Box<dyn Fn(&mut VarMap) -> Result<(), String> + Send + Sync>;

/// A component known to the server.
pub struct ComponentDefinition {
    name: String,
    source: String,
    defaults: VarMap,
    run: Option<RunHook>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("run", &self.run.is_some())
            .finish()
    }
}

impl ComponentDefinition {
    /// Creates a definition without server variables.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            defaults: VarMap::new(),
            run: None,
        }
    }

    /// Declares a server variable with its initial value.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Declares several server variables.
    pub fn with_vars(mut self, vars: VarMap) -> Self {
        self.defaults.extend(vars);
        self
    }

    /// Sets the server hook.
    pub fn with_run(mut self, run: impl Fn(&mut VarMap) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.run = Some(Box::new(run));
        self
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declared server variable names (identity variables excluded).
    pub fn server_var_names(&self) -> Vec<String> {
        self.defaults.keys().cloned().collect()
    }
}

/// Registry of component definitions answering round trips.
#[derive(Debug, Default)]
pub struct ComponentServer {
    components: HashMap<String, ComponentDefinition>,
    cache: TemplateCache,
}

impl ComponentServer {
    /// Creates an empty server with a default cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `cache` for compiled templates.
    pub fn with_cache(mut self, cache: TemplateCache) -> Self {
        self.cache = cache;
        self
    }

    /// Registers (or replaces) a definition.
    pub fn register(&mut self, definition: ComponentDefinition) {
        tracing::debug!(component = %definition.name, "registered component");
        self.components.insert(definition.name.clone(), definition);
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The template cache.
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Answers one request.
    pub fn handle(&self, request: &ComponentRequest) -> Result<ComponentResponse, ServerError> {
        let definition = self
            .components
            .get(&request.component)
            .ok_or_else(|| ServerError::UnknownComponent(request.component.clone()))?;

        let mut vars = definition.defaults.clone();
        if let Some(posted) = &request.server_vars {
            for (name, value) in posted {
                if vars.contains_key(name) {
                    vars.insert(name.clone(), value.clone());
                }
            }
        }
        vars.insert(COMPONENT_VAR.to_string(), JsonValue::from(definition.name.as_str()));
        vars.insert(ID_VAR.to_string(), JsonValue::from(request.id.as_deref().unwrap_or("")));

        if let Some(run) = &definition.run {
            run(&mut vars).map_err(|message| ServerError::Component {
                component: definition.name.clone(),
                message,
            })?;
        }

        let template = self
            .cache
            .get_or_compile(&definition.name, &definition.source, &definition.server_var_names())?;

        let inner_html = match request.mode {
            RenderMode::Ssr => template
                .render_markup(&Mustache, &vars)
                .map_err(|e| ServerError::Component {
                    component: definition.name.clone(),
                    message: e.to_string(),
                })?,
            RenderMode::Csr => String::new(),
        };

        Ok(ComponentResponse::new((*template).clone(), vars, inner_html))
    }

    /// Answers an encoded request with the JSON body to send back.
    ///
    /// Failures are logged and answered as `{"error": ..}`.
    pub fn respond(&self, query: &str, body: &[u8]) -> String {
        let result = ComponentRequest::from_encoded(query, body).and_then(|request| self.handle(&request));
        let encoded = match result {
            Ok(response) => serde_json::to_string(&response),
            Err(e) => {
                tracing::error!(error = %e, "component request failed");
                serde_json::to_string(&ErrorResponse::new(e.to_string()))
            }
        };
        encoded.unwrap_or_else(|e| format!("{{\"error\":{}}}", JsonValue::from(e.to_string())))
    }
}
