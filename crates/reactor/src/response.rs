// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Round-trip response documents.
//!
//! A successful round trip answers
//!
//! ```json
//! { "template": { "component": "..", "jsCode": "..", "cssCode": "..", "htmlCode": ".." },
//!   "serverVars": { "count": 1 },
//!   "innerHTML": "" }
//! ```
//!
//! and a failed one `{ "error": "message" }`.

use serde::{Deserialize, Serialize};

use crate::mustache::VarMap;
use crate::template::Template;

/// Successful round-trip answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    /// The compiled template.
    pub template: Template,
    /// Server values computed for this request.
    #[serde(rename = "serverVars", default)]
    pub server_vars: VarMap,
    /// Server-rendered markup (server-side render mode), empty otherwise.
    #[serde(rename = "innerHTML", default)]
    pub inner_html: String,
}

impl ComponentResponse {
    /// Creates a response.
    pub fn new(template: Template, server_vars: VarMap, inner_html: impl Into<String>) -> Self {
        Self {
            template,
            server_vars,
            inner_html: inner_html.into(),
        }
    }
}

/// Failed round-trip answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error response.
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_names() {
        let mut vars = VarMap::new();
        vars.insert("count".into(), json!(2));
        let response = ComponentResponse::new(Template::new("C", "js", "css", "<p></p>"), vars, "<p>2</p>");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["serverVars"]["count"], json!(2));
        assert_eq!(value["innerHTML"], json!("<p>2</p>"));
        assert_eq!(value["template"]["htmlCode"], json!("<p></p>"));
    }

    #[test]
    fn test_error_response() {
        let value = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(value, json!({"error": "boom"}));
    }
}
