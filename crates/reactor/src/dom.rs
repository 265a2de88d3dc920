// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The host document components are mounted into.

use crate::error::MarkupError;
use crate::markup::{Element, Node};

/// Prefix of the id given to injected component styles.
pub const STYLE_ID_PREFIX: &str = "reactor.style.";

/// An owned page: a head for styles and a body holding mount nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    head: Element,
    body: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self {
            head: Element::new("head"),
            body: Element::new("body"),
        }
    }

    /// Creates a document whose body holds `html`.
    pub fn from_body(html: &str) -> Result<Self, MarkupError> {
        let mut document = Self::new();
        document.body.set_inner_html(html)?;
        Ok(document)
    }

    /// The head element.
    pub fn head(&self) -> &Element {
        &self.head
    }

    /// The body element.
    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Mutable access to the body, for hosts adding or removing nodes.
    pub fn body_mut(&mut self) -> &mut Element {
        &mut self.body
    }

    /// Finds an element by its `id` attribute.
    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.body.find_by_id(id).or_else(|| self.head.find_by_id(id))
    }

    /// Mutable variant of [`Document::element_by_id`].
    pub fn element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        match self.body.find_by_id_mut(id) {
            Some(el) => Some(el),
            None => self.head.find_by_id_mut(id),
        }
    }

    /// Removes the element with the given id, returning it.
    pub fn remove_element(&mut self, id: &str) -> Option<Element> {
        remove_by_id(&mut self.body.children, id)
    }

    /// Returns true if the style of component `key` was injected.
    pub fn has_style(&self, key: &str) -> bool {
        self.head.find_by_id(&style_id(key)).is_some()
    }

    /// Appends the style of component `key` to the head.
    pub fn insert_style(&mut self, key: &str, css: &str) {
        let style = Element::new("style")
            .with_attribute("id", style_id(key))
            .with_text(css);
        self.head.children.push(Node::Element(style));
    }

    /// Serializes the whole page.
    pub fn to_html(&self) -> String {
        format!("<html>{}{}</html>", self.head.outer_html(), self.body.outer_html())
    }
}

fn style_id(key: &str) -> String {
    format!("{}{}", STYLE_ID_PREFIX, key)
}

fn remove_by_id(children: &mut Vec<Node>, id: &str) -> Option<Element> {
    let position = children
        .iter()
        .position(|child| matches!(child, Node::Element(el) if el.attribute("id") == Some(id)));
    if let Some(index) = position {
        return match children.remove(index) {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        };
    }
    children.iter_mut().find_map(|child| match child {
        Node::Element(el) => remove_by_id(&mut el.children, id),
        Node::Text(_) => None,
    })
}
