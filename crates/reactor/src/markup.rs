// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Owned markup tree.
//!
//! The same [`Node`]/[`Element`] types back the compiler (annotated markup
//! before serialization) and the runtime (the live subtree of a mounted
//! component). There is no virtual DOM: elements are mutated in place.

use crate::parser::{parse_markup, ParseMode};
use crate::error::MarkupError;

/// Tag name of the wrapper emitted around every mustache section.
pub const SECTION_TAG: &str = "reactor-section";
/// Tag name of the wrapper emitted around every interpolation.
pub const VAR_TAG: &str = "reactor";
/// Class marking an element whose attributes contain interpolations.
pub const PROPERTIES_CLASS: &str = "hasReactorProperties";
/// Attribute listing the interpolated attribute names of an element.
pub const PROPERTIES_ATTR: &str = "reactorProperties";
/// Attribute carrying the stable identifier of a section or property element.
pub const REACTOR_ID_ATTR: &str = "reactor-id";
/// Prefix of every stable identifier.
pub const REACTOR_ID_PREFIX: &str = "reactorId_";

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Returns true if `name` is an HTML void element.
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// A single `name="value"` pair. Values are kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as written in the source.
    pub name: String,
    /// Raw attribute value (no entity decoding).
    pub value: String,
}

/// A markup node: only elements and text are representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with attributes and children.
    Element(Element),
    /// Raw text content.
    Text(String),
}

impl Node {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }
}

/// An element of the markup tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Lowercase tag name.
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    /// Child nodes.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Looks up an attribute value (ASCII case-insensitive name).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute, keeping its position when it already exists.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Removes an attribute, returning its old value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.attributes.remove(index).value)
    }

    /// Iterates the whitespace-separated classes.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    /// Returns true if the element carries `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Appends a class (no-op if already present).
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let current = self.attribute("class").unwrap_or("").trim().to_string();
        let value = if current.is_empty() {
            class.to_string()
        } else {
            format!("{} {}", current, class)
        };
        self.set_attribute("class", value);
    }

    /// Removes every class matching `predicate`; drops the attribute when empty.
    pub fn remove_classes(&mut self, predicate: impl Fn(&str) -> bool) {
        let Some(current) = self.attribute("class") else {
            return;
        };
        let kept: Vec<&str> = current.split_whitespace().filter(|c| !predicate(c)).collect();
        if kept.is_empty() {
            self.remove_attribute("class");
        } else {
            let value = kept.join(" ");
            self.set_attribute("class", value);
        }
    }

    /// Serializes the children.
    pub fn inner_html(&self) -> String {
        serialize(&self.children)
    }

    /// Serializes the element itself.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    /// Replaces the children with the parsed fragment (lenient parsing).
    pub fn set_inner_html(&mut self, html: &str) -> Result<(), MarkupError> {
        self.children = parse_markup(html, ParseMode::Lenient)?;
        Ok(())
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Follows a path of element-child indices (see [`Element::visit`]).
    pub fn descendant(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get(index)? {
                Node::Element(el) => el,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`Element::descendant`].
    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index)? {
                Node::Element(el) => el,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Preorder walk over descendant elements (not `self`).
    ///
    /// The path passed to `f` indexes into `children` at each level and is
    /// valid for [`Element::descendant_mut`] until the tree is mutated.
    pub fn visit<F: FnMut(&[usize], &Element)>(&self, f: &mut F) {
        let mut path = Vec::new();
        visit_children(&self.children, &mut path, f);
    }

    /// Finds an element (self included) by its `id` attribute.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.attribute("id") == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find_by_id(id),
            Node::Text(_) => None,
        })
    }

    /// Mutable variant of [`Element::find_by_id`].
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.attribute("id") == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            Node::Element(el) => el.find_by_id_mut(id),
            Node::Text(_) => None,
        })
    }

    /// Collects references to descendant elements with the given tag name.
    pub fn elements_by_tag(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_by(&self.children, &|el: &Element| el.name.eq_ignore_ascii_case(name), &mut found);
        found
    }

    /// Collects references to descendant elements carrying `class`.
    pub fn elements_by_class(&self, class: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_by(&self.children, &|el: &Element| el.has_class(class), &mut found);
        found
    }
}

fn visit_children<F: FnMut(&[usize], &Element)>(children: &[Node], path: &mut Vec<usize>, f: &mut F) {
    for (index, child) in children.iter().enumerate() {
        if let Node::Element(el) = child {
            path.push(index);
            f(path, el);
            visit_children(&el.children, path, f);
            path.pop();
        }
    }
}

fn collect_by<'a>(children: &'a [Node], pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    for child in children {
        if let Node::Element(el) = child {
            if pred(el) {
                out.push(el);
            }
            collect_by(&el.children, pred, out);
        }
    }
}

fn collect_text(children: &[Node], out: &mut String) {
    for child in children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

/// Serializes a node list back to markup.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => write_element(el, &mut out),
        }
    }
    out
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for attr in &el.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        if !attr.value.is_empty() {
            out.push_str("=\"");
            out.push_str(&attr.value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    out.push('>');
    if is_void_element(&el.name) {
        return;
    }
    out.push_str(&serialize(&el.children));
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}
