// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The round-trip request between runtime and component server.
//!
//! On the wire a request is a query string (`mode`, `component`, `id`) plus,
//! when an existing component is re-fetched, one form field per server
//! variable named `reactor_serverVariable_<name>` holding the JSON value.
//!
//! ```rust
//! use reactor::{ComponentRequest, VarMap};
//!
//! let mut vars = VarMap::new();
//! vars.insert("count".into(), 1.into());
//! let request = ComponentRequest::new("Counter")
//!     .with_id("main")
//!     .with_server_vars(vars);
//! assert_eq!(request.query_string(), "mode=csr&component=Counter&id=main");
//! assert_eq!(request.form_body(), "reactor_serverVariable_count=1");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ServerError;
use crate::mustache::VarMap;

/// Prefix of the form fields carrying server variables.
pub const SERVER_VAR_PREFIX: &str = "reactor_serverVariable_";

/// Whether the component is rendered by the server or the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Server-side render.
    Ssr,
    /// Client-side render.
    #[default]
    Csr,
}

impl RenderMode {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Ssr => "ssr",
            RenderMode::Csr => "csr",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssr" => Ok(RenderMode::Ssr),
            "csr" => Ok(RenderMode::Csr),
            other => Err(ServerError::InvalidMode(other.to_string())),
        }
    }
}

/// A request for one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRequest {
    /// Render mode.
    pub mode: RenderMode,
    /// Component name.
    pub component: String,
    /// Instance id.
    pub id: Option<String>,
    /// Current server values, present on a re-fetch.
    pub server_vars: Option<VarMap>,
}

impl ComponentRequest {
    /// Creates a first-fetch request in client-render mode.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            mode: RenderMode::Csr,
            component: component.into(),
            id: None,
            server_vars: None,
        }
    }

    /// Sets the instance id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the render mode.
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attaches the current server values.
    pub fn with_server_vars(mut self, vars: VarMap) -> Self {
        self.server_vars = Some(vars);
        self
    }

    /// Query parameters, in wire order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("component".to_string(), self.component.clone()),
        ];
        if let Some(id) = &self.id {
            pairs.push(("id".to_string(), id.clone()));
        }
        pairs
    }

    /// Form fields, one per server variable.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.server_vars
            .iter()
            .flatten()
            .map(|(name, value)| (format!("{}{}", SERVER_VAR_PREFIX, name), value.to_string()))
            .collect()
    }

    /// URL-encoded query string.
    pub fn query_string(&self) -> String {
        encode(&self.query_pairs())
    }

    /// URL-encoded form body.
    pub fn form_body(&self) -> String {
        encode(&self.form_fields())
    }

    /// Decodes a request from its query and form pairs.
    pub fn from_parts(query: &[(String, String)], form: &[(String, String)]) -> Result<Self, ServerError> {
        let param = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let mode = param("mode").unwrap_or("").parse()?;
        let component = param("component")
            .filter(|c| !c.is_empty())
            .ok_or(ServerError::MissingComponent)?
            .to_string();
        let id = param("id").filter(|id| !id.is_empty()).map(str::to_string);

        let mut server_vars: Option<VarMap> = None;
        for (key, raw) in form {
            let Some(name) = key.strip_prefix(SERVER_VAR_PREFIX) else {
                continue;
            };
            let value: JsonValue = serde_json::from_str(raw).map_err(|e| ServerError::InvalidVariable {
                name: name.to_string(),
                message: e.to_string(),
            })?;
            server_vars.get_or_insert_with(VarMap::new).insert(name.to_string(), value);
        }

        Ok(Self {
            mode,
            component,
            id,
            server_vars,
        })
    }

    /// Decodes a request from a raw query string and form body.
    pub fn from_encoded(query: &str, body: &[u8]) -> Result<Self, ServerError> {
        Self::from_parts(&decode(query.as_bytes()), &decode(body))
    }
}

fn encode(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn decode(bytes: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
