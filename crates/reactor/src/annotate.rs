// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Mustache section and variable annotator.
//!
//! Turns raw mustache markup into annotated markup the runtime can patch:
//!
//! 1. Sections are rewritten into `<reactor-section>` wrappers that keep the
//!    original `{{#name}}` / `{{/name}}` text as children, so a plain markup
//!    parser establishes their nesting.
//! 2. The result is parsed strictly; only elements and text are accepted.
//! 3. Text interpolations become `<reactor type="var">` elements, triple
//!    mustaches first, so both forms inside the same text are captured.
//! 4. Interpolated attributes are listed on the element (`reactorProperties`)
//!    and calls to public component functions inside attribute values are
//!    qualified through `REACTOR.getComponent(..)`.
//! 5. Section wrappers and property elements receive a stable id
//!    (`reactorId_N`, preorder), sections their nesting depth.
//!
//! [`strip_annotations`] is the inverse: it removes every artifact again.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::{CompileError, MarkupError};
use crate::markup::{
    serialize, Element, Node, PROPERTIES_ATTR, PROPERTIES_CLASS, REACTOR_ID_ATTR, REACTOR_ID_PREFIX,
    SECTION_TAG, VAR_TAG,
};
use crate::parser::{parse_markup, ParseMode};

lazy_static! {
    static ref SECTION_TAG_RE: Regex = Regex::new(r"\{\{\s*([#^/])\s*(\w+)\s*\}\}").unwrap();
    static ref TRIPLE_VAR_RE: Regex = Regex::new(r"\{\{\{\s*&?\s*(\w+)\s*\}\}\}").unwrap();
    static ref DOUBLE_VAR_RE: Regex = Regex::new(r"\{\{\s*(&?)\s*(\w+)\s*\}\}").unwrap();
    static ref ATTRIBUTE_VAR_RE: Regex = Regex::new(r"\{\{\s*&?\s*(\w+)\s*\}\}").unwrap();
}

/// Qualifier prepended to public function calls found in attribute values.
pub const CALL_QUALIFIER: &str = "REACTOR.getComponent('{{{reactorComponent}}}', '{{{reactorId}}}').";

/// Annotates the markup of one component.
///
/// `functions` are the public function names of the component program; calls
/// to them inside attribute values are qualified.
pub fn annotate(component: &str, markup: &str, functions: &[String]) -> Result<String, CompileError> {
    let sectioned = wrap_sections(component, markup)?;
    let nodes = parse_markup(&sectioned, ParseMode::Strict)
        .map_err(|e| CompileError::from_markup(component, &sectioned, e))?;

    let mut annotator = Annotator {
        calls: call_pattern(functions),
        serial: 0,
    };
    let nodes = annotator.process_children(nodes, 0);
    tracing::debug!(component, ids = annotator.serial, "annotated markup");
    Ok(serialize(&nodes).trim().to_string())
}

/// Rewrites `{{#x}}..{{/x}}` and `{{^x}}..{{/x}}` into section wrappers,
/// checking that every close matches the innermost open.
fn wrap_sections(component: &str, markup: &str) -> Result<String, CompileError> {
    let nesting = |detail: String| CompileError::SectionNesting {
        component: component.to_string(),
        detail,
    };

    let mut open: Vec<String> = Vec::new();
    let mut out = String::with_capacity(markup.len() + 64);
    let mut cursor = 0;

    for caps in SECTION_TAG_RE.captures_iter(markup) {
        let (Some(whole), Some(op), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&markup[cursor..whole.start()]);
        cursor = whole.end();
        let name = name.as_str();
        match op.as_str() {
            "/" => match open.pop() {
                Some(expected) if expected == name => {
                    out.push_str(&format!("{{{{/{}}}}}</{}>", name, SECTION_TAG));
                }
                Some(expected) => {
                    return Err(nesting(format!("{{{{#{}}}}} is closed by {{{{/{}}}}}", expected, name)))
                }
                None => return Err(nesting(format!("{{{{/{}}}}} has no opening section", name))),
            },
            op => {
                open.push(name.to_string());
                out.push_str(&format!(
                    "<{tag} var=\"{name}\" op=\"{op}\">{{{{{op}{name}}}}}",
                    tag = SECTION_TAG,
                ));
            }
        }
    }
    out.push_str(&markup[cursor..]);

    match open.pop() {
        Some(name) => Err(nesting(format!("{{{{#{}}}}} is never closed", name))),
        None => Ok(out),
    }
}

fn call_pattern(functions: &[String]) -> Option<Regex> {
    if functions.is_empty() {
        return None;
    }
    let names: Vec<String> = functions.iter().map(|f| regex::escape(f)).collect();
    // no lookbehind in `regex`: the preceding character is captured instead
    Regex::new(&format!(r"(^|[^.\w])({})\(", names.join("|"))).ok()
}

struct Annotator {
    calls: Option<Regex>,
    serial: usize,
}

impl Annotator {
    fn process_children(&mut self, children: Vec<Node>, depth: usize) -> Vec<Node> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Node::Text(text) if text.trim().is_empty() => {}
                Node::Text(text) => out.extend(split_text(&text)),
                Node::Element(mut element) => {
                    let mut child_depth = depth;
                    if element.name == SECTION_TAG {
                        child_depth += 1;
                        element.set_attribute("depth", child_depth.to_string());
                    }
                    self.process_attributes(&mut element);
                    let grandchildren = std::mem::take(&mut element.children);
                    element.children = self.process_children(grandchildren, child_depth);
                    out.push(Node::Element(element));
                }
            }
        }
        out
    }

    fn process_attributes(&mut self, element: &mut Element) {
        let mut properties: Vec<String> = Vec::new();
        for attr in element.attributes.iter_mut() {
            if ATTRIBUTE_VAR_RE.is_match(&attr.value) && !properties.contains(&attr.name) {
                properties.push(attr.name.clone());
            }
            if let Some(calls) = &self.calls {
                let qualified = calls.replace_all(&attr.value, |caps: &Captures| {
                    format!("{}{}{}(", &caps[1], CALL_QUALIFIER, &caps[2])
                });
                if qualified != attr.value {
                    attr.value = qualified.into_owned();
                }
            }
        }

        if !properties.is_empty() {
            element.add_class(PROPERTIES_CLASS);
            element.set_attribute(PROPERTIES_ATTR, properties.join(","));
        }
        if element.name == SECTION_TAG || !properties.is_empty() {
            self.serial += 1;
            let id = format!("{}{}", REACTOR_ID_PREFIX, self.serial);
            element.add_class(&id);
            element.set_attribute(REACTOR_ID_ATTR, id);
        }
    }
}

fn var_node(name: &str, escaped: bool, original: &str) -> Node {
    Node::Element(
        Element::new(VAR_TAG)
            .with_attribute("type", "var")
            .with_attribute("name", name)
            .with_attribute("escaped", if escaped { "true" } else { "false" })
            .with_text(original),
    )
}

/// Splits text on triple mustaches, delegating the pieces in between to
/// [`split_double`].
fn split_text(text: &str) -> Vec<Node> {
    let Some(caps) = TRIPLE_VAR_RE.captures(text) else {
        return split_double(text);
    };
    let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
        return split_double(text);
    };
    let mut nodes = split_double(&text[..whole.start()]);
    nodes.push(var_node(name.as_str(), false, whole.as_str()));
    nodes.extend(split_text(&text[whole.end()..]));
    nodes
}

fn split_double(text: &str) -> Vec<Node> {
    if text.is_empty() {
        return Vec::new();
    }
    let Some(caps) = DOUBLE_VAR_RE.captures(text) else {
        return vec![Node::Text(text.to_string())];
    };
    let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
        return vec![Node::Text(text.to_string())];
    };
    let escaped = caps.get(1).map_or(true, |amp| amp.as_str().is_empty());
    let mut nodes = Vec::new();
    if whole.start() > 0 {
        nodes.push(Node::Text(text[..whole.start()].to_string()));
    }
    nodes.push(var_node(name.as_str(), escaped, whole.as_str()));
    nodes.extend(split_double(&text[whole.end()..]));
    nodes
}

/// Removes every annotation artifact from annotated markup.
///
/// Variable and section wrappers are replaced by their children, the added
/// classes and attributes are dropped and qualified calls are unqualified.
pub fn strip_annotations(markup: &str) -> Result<String, MarkupError> {
    let nodes = parse_markup(markup, ParseMode::Lenient)?;
    Ok(serialize(&strip_nodes(nodes)))
}

fn strip_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => push_text(&mut out, text),
            Node::Element(element) if element.name == VAR_TAG || element.name == SECTION_TAG => {
                for child in strip_nodes(element.children) {
                    match child {
                        Node::Text(text) => push_text(&mut out, text),
                        other => out.push(other),
                    }
                }
            }
            Node::Element(mut element) => {
                element.remove_attribute(PROPERTIES_ATTR);
                element.remove_attribute(REACTOR_ID_ATTR);
                element.remove_classes(|c| c == PROPERTIES_CLASS || c.starts_with(REACTOR_ID_PREFIX));
                for attr in element.attributes.iter_mut() {
                    if attr.value.contains(CALL_QUALIFIER) {
                        attr.value = attr.value.replace(CALL_QUALIFIER, "");
                    }
                }
                element.children = strip_nodes(element.children);
                out.push(Node::Element(element));
            }
        }
    }
    out
}

fn push_text(out: &mut Vec<Node>, text: String) {
    if let Some(Node::Text(last)) = out.last_mut() {
        last.push_str(&text);
    } else {
        out.push(Node::Text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(markup: &str) -> String {
        annotate("Demo", markup, &[]).unwrap()
    }

    #[test]
    fn test_single_section() {
        assert_eq!(
            compile("{{#sectionName}}Content{{/sectionName}}"),
            "<reactor-section var=\"sectionName\" op=\"#\" depth=\"1\" class=\"reactorId_1\" reactor-id=\"reactorId_1\">{{#sectionName}}Content{{/sectionName}}</reactor-section>"
        );
    }

    #[test]
    fn test_nested_sections() {
        assert_eq!(
            compile("{{#sectionName}}{{#nested}}Content{{/nested}}{{/sectionName}}"),
            "<reactor-section var=\"sectionName\" op=\"#\" depth=\"1\" class=\"reactorId_1\" reactor-id=\"reactorId_1\">{{#sectionName}}\
<reactor-section var=\"nested\" op=\"#\" depth=\"2\" class=\"reactorId_2\" reactor-id=\"reactorId_2\">{{#nested}}Content{{/nested}}</reactor-section>\
{{/sectionName}}</reactor-section>"
        );
    }

    #[test]
    fn test_inverted_section_and_whitespace_in_tags() {
        let out = compile("{{^ empty }}none{{/ empty }}");
        assert!(out.starts_with("<reactor-section var=\"empty\" op=\"^\" depth=\"1\""));
        assert!(out.contains(">{{^empty}}none{{/empty}}</reactor-section>"));
    }

    #[test]
    fn test_sibling_sections_share_depth() {
        let out = compile("<div>{{#a}}x{{/a}}{{#b}}{{#c}}y{{/c}}{{/b}}</div>{{#d}}z{{/d}}");
        let root = {
            let mut el = Element::new("body");
            el.set_inner_html(&out).unwrap();
            el
        };
        let depths: Vec<(String, String)> = root
            .elements_by_tag(SECTION_TAG)
            .iter()
            .map(|s| (s.attribute("var").unwrap().to_string(), s.attribute("depth").unwrap().to_string()))
            .collect();
        assert_eq!(
            depths,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "1".to_string()),
                ("c".to_string(), "2".to_string()),
                ("d".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_section_name_mismatch() {
        let err = annotate("Demo", "{{#a}}x{{/b}}", &[]).unwrap_err();
        assert!(err.is_section_nesting());
        assert!(err.to_string().contains("{{#a}} is closed by {{/b}}"));
    }

    #[test]
    fn test_unclosed_and_unopened_sections() {
        assert!(annotate("Demo", "{{#a}}x", &[]).unwrap_err().is_section_nesting());
        assert!(annotate("Demo", "x{{/a}}", &[]).unwrap_err().is_section_nesting());
    }

    #[test]
    fn test_section_crossing_element_boundary() {
        let err = annotate("Demo", "<div>{{#a}}</div>{{/a}}", &[]).unwrap_err();
        assert!(err.is_section_nesting());
    }

    #[test]
    fn test_generic_parse_error_is_distinct() {
        let err = annotate("Demo", "<p>x</p></div>", &[]).unwrap_err();
        assert!(!err.is_section_nesting());
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn test_comment_is_unsupported() {
        let err = annotate("Demo", "<p>x</p><!-- c -->", &[]).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedNode { kind: "comment", .. }));
    }

    #[test]
    fn test_text_vars() {
        assert_eq!(
            compile("<p>Hi {{name}}, {{{html}}} and {{& raw}}!</p>"),
            "<p>Hi <reactor type=\"var\" name=\"name\" escaped=\"true\">{{name}}</reactor>, \
<reactor type=\"var\" name=\"html\" escaped=\"false\">{{{html}}}</reactor> and \
<reactor type=\"var\" name=\"raw\" escaped=\"false\">{{& raw}}</reactor>!</p>"
        );
    }

    #[test]
    fn test_repeated_triple_vars() {
        let out = compile("<p>{{{a}}}{{{b}}}</p>");
        assert_eq!(out.matches("escaped=\"false\"").count(), 2);
        assert!(!out.contains("escaped=\"true\""));
    }

    #[test]
    fn test_unmatched_mustache_is_literal() {
        assert_eq!(compile("<p>{{ not closed</p>"), "<p>{{ not closed</p>");
    }

    #[test]
    fn test_whitespace_text_dropped() {
        assert_eq!(compile("<ul>\n  <li>a</li>\n</ul>"), "<ul><li>a</li></ul>");
    }

    #[test]
    fn test_property_element() {
        let out = annotate(
            "Demo",
            "<button class=\"btn\" title=\"{{title}}\" onclick=\"increase()\">+</button>",
            &["increase".to_string()],
        )
        .unwrap();
        assert_eq!(
            out,
            "<button class=\"btn hasReactorProperties reactorId_1\" title=\"{{title}}\" \
onclick=\"REACTOR.getComponent('{{{reactorComponent}}}', '{{{reactorId}}}').increase()\" \
reactorProperties=\"title\" reactor-id=\"reactorId_1\">+</button>"
        );
    }

    #[test]
    fn test_method_calls_are_not_qualified() {
        let out = annotate("Demo", "<a onclick=\"obj.increase(); increased()\">x</a>", &["increase".to_string()]).unwrap();
        assert_eq!(out, "<a onclick=\"obj.increase(); increased()\">x</a>");
    }

    #[test]
    fn test_ids_are_preorder_and_unique() {
        let out = compile("{{#a}}<p title=\"{{x}}\">{{#b}}y{{/b}}</p>{{/a}}<i class=\"{{c}}\"></i>");
        let mut root = Element::new("body");
        root.set_inner_html(&out).unwrap();
        let mut ids = Vec::new();
        root.visit(&mut |_, el| {
            if let Some(id) = el.attribute(REACTOR_ID_ATTR) {
                ids.push(id.to_string());
            }
        });
        assert_eq!(ids, vec!["reactorId_1", "reactorId_2", "reactorId_3", "reactorId_4"]);
    }

    #[test]
    fn test_strip_restores_original() {
        let original = "<p class=\"x\">Hi {{name}}</p><button title=\"{{t}}\" onclick=\"go()\">Go</button>{{#a}}<b>{{{html}}}</b>{{/a}}";
        let annotated = annotate("Demo", original, &["go".to_string()]).unwrap();
        assert_ne!(annotated, original);
        assert_eq!(strip_annotations(&annotated).unwrap(), original);
    }
}
