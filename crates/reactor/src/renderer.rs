// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Initial render and incremental patching of a mounted component.
//!
//! A reflow walks the annotated markup under the mount node in three passes:
//!
//! 1. `<reactor type="var">` nodes whose variable changed and whose rendered
//!    text differs are re-rendered and highlighted.
//! 2. Elements carrying `reactorProperties` get every listed attribute
//!    re-rendered from the template, whether or not its variables changed.
//! 3. `<reactor-section>` wrappers are visited in document order. A changed
//!    section is re-rendered from its original fragment, and the sections
//!    nested inside it (greater depth) are skipped until a section at the
//!    same or a lower depth shows up.

use crate::dom::Document;
use crate::error::ProgramError;
use crate::markup::{Element, PROPERTIES_ATTR, PROPERTIES_CLASS, REACTOR_ID_ATTR, SECTION_TAG, VAR_TAG};
use crate::mustache::{TemplateEngine, VarMap};
use crate::template::Template;

/// Variables whose value differs from the last baseline, with their new value.
pub type ChangeSet = VarMap;

/// What a component render works on.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget<'a> {
    /// Registry key of the component, names its style element.
    pub key: &'a str,
    /// `id` of the mount node.
    pub node: &'a str,
    /// The compiled template.
    pub template: &'a Template,
    /// Current variables.
    pub vars: &'a VarMap,
}

/// Outcome of a render or reflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflowReport {
    /// True when the node content was fully replaced.
    pub initial: bool,
    /// Snapshots of the nodes that must be highlighted.
    pub updated: Vec<Element>,
    /// Stable ids of the sections that were re-rendered.
    pub sections: Vec<String>,
    /// Sections skipped because an ancestor was re-rendered in the same pass.
    pub skipped: usize,
}

struct SectionMarker {
    path: Vec<usize>,
    var: String,
    depth: usize,
    reactor_id: String,
}

/// Stateless renderer over a pluggable mustache engine.
pub struct Renderer<'e> {
    engine: &'e dyn TemplateEngine,
}

impl<'e> Renderer<'e> {
    /// Creates a renderer.
    pub fn new(engine: &'e dyn TemplateEngine) -> Self {
        Self { engine }
    }

    /// First-time render of a component.
    ///
    /// Injects the style and replaces the node content. When the style of
    /// this component is already present the call is treated as a reflow.
    pub fn render(
        &self,
        document: &mut Document,
        target: RenderTarget<'_>,
        changed: &ChangeSet,
    ) -> Result<ReflowReport, ProgramError> {
        if document.has_style(target.key) {
            return self.reflow(document, target, changed);
        }

        let html = target.template.render_markup(self.engine, target.vars)?;
        document.insert_style(target.key, target.template.style());
        let node = mount_node(document, target)?;
        node.set_inner_html(&html)?;
        tracing::debug!(component = target.key, "rendered component");

        Ok(ReflowReport {
            initial: true,
            updated: vec![node.clone()],
            ..ReflowReport::default()
        })
    }

    /// Patches only what `changed` touches.
    pub fn reflow(
        &self,
        document: &mut Document,
        target: RenderTarget<'_>,
        changed: &ChangeSet,
    ) -> Result<ReflowReport, ProgramError> {
        let node = mount_node(document, target)?;
        let mut report = ReflowReport::default();

        self.reflow_vars(node, target, changed, &mut report)?;
        self.reflow_properties(node, target)?;
        self.reflow_sections(node, target, changed, &mut report)?;

        tracing::debug!(
            component = target.key,
            updated = report.updated.len(),
            sections = report.sections.len(),
            skipped = report.skipped,
            "reflowed component"
        );
        Ok(report)
    }

    fn reflow_vars(
        &self,
        node: &mut Element,
        target: RenderTarget<'_>,
        changed: &ChangeSet,
        report: &mut ReflowReport,
    ) -> Result<(), ProgramError> {
        let mut vars = Vec::new();
        node.visit(&mut |path, el| {
            if el.name == VAR_TAG && el.attribute("type") == Some("var") {
                if let Some(name) = el.attribute("name").filter(|name| changed.contains_key(*name)) {
                    let escaped = el.attribute("escaped") != Some("false");
                    vars.push((path.to_vec(), name.to_string(), escaped, el.inner_html()));
                }
            }
        });

        for (path, name, escaped, rendered) in vars {
            let code = if escaped {
                format!("{{{{{}}}}}", name)
            } else {
                format!("{{{{{{{}}}}}}}", name)
            };
            let html = target
                .template
                .render(self.engine, &format!("variable {}", name), &code, target.vars)?;
            if html == rendered {
                continue;
            }
            if let Some(var_node) = node.descendant_mut(&path) {
                var_node.set_inner_html(&html)?;
                report.updated.push(var_node.clone());
            }
        }
        Ok(())
    }

    fn reflow_properties(&self, node: &mut Element, target: RenderTarget<'_>) -> Result<(), ProgramError> {
        let mut elements = Vec::new();
        node.visit(&mut |path, el| {
            if !el.has_class(PROPERTIES_CLASS) {
                return;
            }
            if let (Some(id), Some(props)) = (el.attribute(REACTOR_ID_ATTR), el.attribute(PROPERTIES_ATTR)) {
                elements.push((path.to_vec(), id.to_string(), props.to_string()));
            }
        });

        for (path, reactor_id, props) in elements {
            let mut values = Vec::new();
            for attribute in props.split(',').filter(|a| !a.is_empty()) {
                let source = target.template.attribute_source(&reactor_id, attribute)?;
                let value = target.template.render(
                    self.engine,
                    &format!("attribute {}", attribute),
                    source,
                    target.vars,
                )?;
                values.push((attribute, value));
            }
            if let Some(el) = node.descendant_mut(&path) {
                for (attribute, value) in values {
                    el.set_attribute(attribute, value);
                }
            }
        }
        Ok(())
    }

    fn reflow_sections(
        &self,
        node: &mut Element,
        target: RenderTarget<'_>,
        changed: &ChangeSet,
        report: &mut ReflowReport,
    ) -> Result<(), ProgramError> {
        let mut sections = Vec::new();
        node.visit(&mut |path, el| {
            if el.name != SECTION_TAG {
                return;
            }
            let (Some(var), Some(reactor_id)) = (el.attribute("var"), el.attribute(REACTOR_ID_ATTR)) else {
                return;
            };
            sections.push(SectionMarker {
                path: path.to_vec(),
                var: var.to_string(),
                depth: el.attribute("depth").and_then(|d| d.parse().ok()).unwrap_or(1),
                reactor_id: reactor_id.to_string(),
            });
        });

        let mut rendered_depth: Option<usize> = None;
        for section in sections {
            if let Some(depth) = rendered_depth {
                if section.depth > depth {
                    report.skipped += 1;
                    continue;
                }
                rendered_depth = None;
            }
            if !changed.contains_key(&section.var) {
                continue;
            }

            let source = target.template.section_source(&section.reactor_id)?;
            let html = target
                .template
                .render(self.engine, &format!("section {}", section.var), source, target.vars)?;
            if let Some(el) = node.descendant_mut(&section.path) {
                el.set_inner_html(&html)?;
                report.sections.push(section.reactor_id);
                rendered_depth = Some(section.depth);
            }
        }
        Ok(())
    }
}

fn mount_node<'d>(document: &'d mut Document, target: RenderTarget<'_>) -> Result<&'d mut Element, ProgramError> {
    document
        .element_by_id_mut(target.node)
        .ok_or_else(|| ProgramError::NodeDetached {
            component: target.key.to_string(),
            node: target.node.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::mustache::Mustache;
    use serde_json::{json, Value as JsonValue};

    fn vars(value: JsonValue) -> VarMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn mounted(source: &str, state: &VarMap) -> (Document, Template) {
        let template = compile("Demo", source, &[]).unwrap();
        let mut document = Document::from_body("<div id=\"app\"></div>").unwrap();
        let target = RenderTarget {
            key: "Demo",
            node: "app",
            template: &template,
            vars: state,
        };
        let report = Renderer::new(&Mustache).render(&mut document, target, state).unwrap();
        assert!(report.initial);
        (document, template)
    }

    fn reflow(document: &mut Document, template: &Template, state: &VarMap, changed: JsonValue) -> ReflowReport {
        let target = RenderTarget {
            key: "Demo",
            node: "app",
            template,
            vars: state,
        };
        Renderer::new(&Mustache).reflow(document, target, &vars(changed)).unwrap()
    }

    fn app_html(document: &Document) -> String {
        document.element_by_id("app").unwrap().inner_html()
    }

    #[test]
    fn test_initial_render_injects_style() {
        let state = vars(json!({"label": "a"}));
        let (document, _) = mounted("<style>p{}</style><p>{{label}}</p>", &state);
        assert!(document.has_style("Demo"));
        assert_eq!(
            app_html(&document),
            "<p><reactor type=\"var\" name=\"label\" escaped=\"true\">a</reactor></p>"
        );
    }

    #[test]
    fn test_second_render_is_a_reflow() {
        let state = vars(json!({"label": "a"}));
        let (mut document, template) = mounted("<p>{{label}}</p>", &state);
        let state = vars(json!({"label": "b"}));
        let target = RenderTarget {
            key: "Demo",
            node: "app",
            template: &template,
            vars: &state,
        };
        let report = Renderer::new(&Mustache).render(&mut document, target, &state).unwrap();
        assert!(!report.initial);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(document.head().children.len(), 1);
    }

    #[test]
    fn test_var_reflow_only_touches_changed_names() {
        let state = vars(json!({"label": "a", "other": "x"}));
        let (mut document, template) = mounted("<p>{{label}}</p><i>{{other}}</i>", &state);

        let state = vars(json!({"label": "<b>", "other": "y"}));
        let report = reflow(&mut document, &template, &state, json!({"label": "<b>"}));
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].attribute("name"), Some("label"));
        assert_eq!(
            app_html(&document),
            "<p><reactor type=\"var\" name=\"label\" escaped=\"true\">&lt;b&gt;</reactor></p>\
<i><reactor type=\"var\" name=\"other\" escaped=\"true\">x</reactor></i>"
        );
    }

    #[test]
    fn test_unchanged_rendering_is_not_highlighted() {
        let state = vars(json!({"n": 1}));
        let (mut document, template) = mounted("<p>{{n}}</p>", &state);
        let report = reflow(&mut document, &template, &state, json!({"n": 1}));
        assert!(report.updated.is_empty());
    }

    #[test]
    fn test_properties_always_rerender() {
        let state = vars(json!({"cls": "on"}));
        let (mut document, template) = mounted("<p class=\"{{cls}}\" title=\"t-{{cls}}\">x</p>", &state);

        let state = vars(json!({"cls": "off"}));
        reflow(&mut document, &template, &state, json!({}));
        let app = document.element_by_id("app").unwrap();
        let p = app.elements_by_tag("p")[0];
        assert_eq!(p.attribute("class"), Some("off hasReactorProperties reactorId_1"));
        assert_eq!(p.attribute("title"), Some("t-off"));
    }

    #[test]
    fn test_section_rerender_and_depth_skip() {
        let source = "{{#outer}}<div>{{#inner}}<b>in</b>{{/inner}}</div>{{/outer}}{{#after}}<i>after</i>{{/after}}";
        let state = vars(json!({"outer": true, "inner": false, "after": false}));
        let (mut document, template) = mounted(source, &state);
        assert!(!app_html(&document).contains("<b>in</b>"));

        let state = vars(json!({"outer": true, "inner": true, "after": true}));
        let report = reflow(
            &mut document,
            &template,
            &state,
            json!({"outer": true, "inner": true, "after": true}),
        );
        assert_eq!(report.sections, vec!["reactorId_1", "reactorId_3"]);
        assert_eq!(report.skipped, 1);
        let html = app_html(&document);
        assert!(html.contains("<b>in</b>"));
        assert!(html.contains("<i>after</i>"));
    }

    #[test]
    fn test_nested_section_alone() {
        let source = "{{#outer}}<div>{{#inner}}<b>in</b>{{/inner}}</div>{{/outer}}";
        let state = vars(json!({"outer": true, "inner": false}));
        let (mut document, template) = mounted(source, &state);

        let state = vars(json!({"outer": true, "inner": true}));
        let report = reflow(&mut document, &template, &state, json!({"inner": true}));
        assert_eq!(report.sections, vec!["reactorId_2"]);
        assert_eq!(report.skipped, 0);
        assert!(app_html(&document).contains("<b>in</b>"));
    }

    #[test]
    fn test_detached_node() {
        let state = vars(json!({}));
        let (mut document, template) = mounted("<p>x</p>", &state);
        document.remove_element("app");
        let target = RenderTarget {
            key: "Demo",
            node: "app",
            template: &template,
            vars: &state,
        };
        let err = Renderer::new(&Mustache).reflow(&mut document, target, &state).unwrap_err();
        assert!(matches!(err, ProgramError::NodeDetached { .. }));
    }
}
