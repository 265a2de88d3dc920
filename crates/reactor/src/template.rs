// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled component templates.
//!
//! A [`Template`] is the immutable output of one compile. Its serde shape is
//! the wire format exchanged between server and runtime:
//!
//! ```json
//! { "component": "Counter", "jsCode": "...", "cssCode": "...", "htmlCode": "..." }
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::annotate::strip_annotations;
use crate::codegen::{lua_literal, CLIENT_CODE_END, CLIENT_CODE_START};
use crate::error::{MarkupError, ProgramError};
use crate::markup::{Attribute, Element, REACTOR_ID_ATTR};
use crate::mustache::{TemplateEngine, VarMap};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\{(\w+)\}\}\}").unwrap();
}

/// Original markup of one section or property element.
#[derive(Debug, Clone)]
struct Fragment {
    inner_html: String,
    attributes: Vec<Attribute>,
}

/// Immutable bundle produced per compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "component")]
    name: String,
    #[serde(rename = "jsCode")]
    program: String,
    #[serde(rename = "cssCode")]
    style: String,
    #[serde(rename = "htmlCode")]
    markup: String,
    #[serde(skip)]
    fragments: OnceLock<HashMap<String, Fragment>>,
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.program == other.program
            && self.style == other.style
            && self.markup == other.markup
    }
}

impl Template {
    /// Creates a template from its compiled parts.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        style: impl Into<String>,
        markup: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            style: style.into(),
            markup: markup.into(),
            fragments: OnceLock::new(),
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program source with `{{{name}}}` placeholders.
    pub fn program_source(&self) -> &str {
        &self.program
    }

    /// Style text.
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Annotated markup.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Program source with server values embedded as Lua literals.
    ///
    /// Only the header (before the client-code marker) is substituted so that
    /// user code containing `{{{..}}}` is left untouched. Missing values become `nil`.
    pub fn instantiate_source(&self, server_vars: &VarMap) -> String {
        let split = self.program.find(CLIENT_CODE_START).unwrap_or(self.program.len());
        let (header, body) = self.program.split_at(split);
        let header = PLACEHOLDER_RE.replace_all(header, |caps: &Captures| match server_vars.get(&caps[1]) {
            Some(value) => lua_literal(value),
            None => "nil".to_string(),
        });
        format!("{}{}", header, body)
    }

    /// The user code between the client-code markers.
    pub fn original_script(&self) -> Option<&str> {
        let start = self.program.find(CLIENT_CODE_START)? + CLIENT_CODE_START.len();
        let end = self.program[start..].find(CLIENT_CODE_END)? + start;
        let code = self.program[start..end].trim_start_matches('\n');
        // drop the indentation preceding the end marker
        Some(code.trim_end_matches([' ', '\t']))
    }

    /// Markup with every annotation artifact removed.
    pub fn clean_markup(&self) -> Result<String, MarkupError> {
        strip_annotations(&self.markup)
    }

    fn fragments(&self) -> &HashMap<String, Fragment> {
        self.fragments.get_or_init(|| {
            let mut root = Element::new("body");
            let mut index = HashMap::new();
            if root.set_inner_html(&self.markup).is_err() {
                return index;
            }
            root.visit(&mut |_, el| {
                if let Some(id) = el.attribute(REACTOR_ID_ATTR) {
                    index.insert(
                        id.to_string(),
                        Fragment {
                            inner_html: el.inner_html(),
                            attributes: el.attributes.clone(),
                        },
                    );
                }
            });
            index
        })
    }

    fn fragment(&self, reactor_id: &str) -> Result<&Fragment, ProgramError> {
        self.fragments()
            .get(reactor_id)
            .ok_or_else(|| ProgramError::MissingFragment {
                component: self.name.clone(),
                reactor_id: reactor_id.to_string(),
            })
    }

    /// Original inner markup of the section with stable id `reactor_id`.
    pub fn section_source(&self, reactor_id: &str) -> Result<&str, ProgramError> {
        Ok(&self.fragment(reactor_id)?.inner_html)
    }

    /// Original value of `attribute` on the property element `reactor_id`.
    pub fn attribute_source(&self, reactor_id: &str, attribute: &str) -> Result<&str, ProgramError> {
        let fragment = self.fragment(reactor_id)?;
        Ok(fragment
            .attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(attribute))
            .map(|a| a.value.as_str())
            .unwrap_or(""))
    }

    /// Renders `code` through `engine`, wrapping failures with what was rendered.
    pub fn render(
        &self,
        engine: &dyn TemplateEngine,
        what: &str,
        code: &str,
        vars: &VarMap,
    ) -> Result<String, ProgramError> {
        engine.render(code, vars).map_err(|e| {
            let mut message = e.to_string();
            if message.contains("Can't find") {
                message.push_str(" (check that every variable used in the markup is declared)");
            }
            ProgramError::Render {
                what: what.to_string(),
                component: self.name.clone(),
                message,
            }
        })
    }

    /// Renders the whole markup.
    pub fn render_markup(&self, engine: &dyn TemplateEngine, vars: &VarMap) -> Result<String, ProgramError> {
        self.render(engine, "template", &self.markup, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mustache::{Mustache, RenderError};
    use serde_json::json;

    fn sample() -> Template {
        Template::new(
            "Card",
            "return function(n)\n    local title = {{{title}}}\n    local reactorId <const> = {{{reactorId}}}\n    --REACTOR_CLIENT_CODE_STARTS--\n    local s = \"{{{title}}}\"\n    --REACTOR_CLIENT_CODE_ENDS--\nend\n",
            ".card {}",
            "<h1 title=\"{{title}}\" class=\"hasReactorProperties reactorId_1\" reactorProperties=\"title\" reactor-id=\"reactorId_1\">x</h1>\
<reactor-section var=\"open\" op=\"#\" depth=\"1\" class=\"reactorId_2\" reactor-id=\"reactorId_2\">{{#open}}<p>{{title}}</p>{{/open}}</reactor-section>",
        )
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["component"], "Card");
        assert_eq!(value["cssCode"], ".card {}");
        assert!(value["jsCode"].as_str().unwrap().contains("local title"));
        assert!(value["htmlCode"].as_str().unwrap().starts_with("<h1"));

        let back: Template = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_instantiate_substitutes_header_only() {
        let mut vars = VarMap::new();
        vars.insert("title".into(), json!("Hi \"you\""));
        let source = sample().instantiate_source(&vars);
        assert!(source.contains("local title = \"Hi \\\"you\\\"\""));
        assert!(source.contains("local reactorId <const> = nil"));
        assert!(source.contains("local s = \"{{{title}}}\""));
    }

    #[test]
    fn test_original_script() {
        assert_eq!(sample().original_script(), Some("    local s = \"{{{title}}}\"\n"));
        assert_eq!(Template::new("x", "no markers", "", "").original_script(), None);
    }

    #[test]
    fn test_fragments() {
        let template = sample();
        assert_eq!(template.section_source("reactorId_2").unwrap(), "{{#open}}<p>{{title}}</p>{{/open}}");
        assert_eq!(template.attribute_source("reactorId_1", "title").unwrap(), "{{title}}");
        assert!(matches!(
            template.section_source("reactorId_9"),
            Err(ProgramError::MissingFragment { .. })
        ));
    }

    #[test]
    fn test_clean_markup() {
        assert_eq!(
            sample().clean_markup().unwrap(),
            "<h1 title=\"{{title}}\">x</h1>{{#open}}<p>{{title}}</p>{{/open}}"
        );
    }

    #[test]
    fn test_render_error_is_wrapped() {
        let failing = |_: &str, _: &VarMap| -> Result<String, RenderError> { Err(RenderError("Can't find x".into())) };
        let err = sample().render(&failing, "section open", "{{x}}", &VarMap::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Error rendering section open for component \"Card\": Can't find x"));
        assert!(message.contains("check that every variable"));
        assert!(sample().render_markup(&Mustache, &VarMap::new()).is_ok());
    }
}
