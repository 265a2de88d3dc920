// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Markup parser.
//!
//! The pest grammar in `markup.pest` only tokenizes; this module rebuilds the
//! element tree from the flat token stream. Two modes exist:
//!
//! - [`ParseMode::Strict`] is used by the compiler. Comments, doctypes, CDATA
//!   and processing instructions are rejected, stray end tags are errors, and
//!   anything that would break a `reactor-section` wrapper is reported as a
//!   section nesting problem.
//! - [`ParseMode::Lenient`] is used at runtime when assigning inner HTML.
//!   It behaves like a forgiving HTML parser: unknown nodes are dropped,
//!   stray end tags ignored and open elements closed implicitly.

use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::error::MarkupError;
use crate::markup::{is_void_element, Attribute, Element, Node, SECTION_TAG};

/// Pest-derived markup tokenizer.
#[derive(Parser)]
#[grammar = "markup.pest"]
pub struct MarkupParser;

/// How tolerant tree construction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Compile-time parsing: every irregularity is an error.
    Strict,
    /// Runtime parsing: irregularities are repaired silently.
    Lenient,
}

/// A `<script>` or `<style>` element located in a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// `script` or `style`.
    pub tag: String,
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Byte offset just past the closing `>`.
    pub end: usize,
    /// Attributes of the opening tag.
    pub attributes: Vec<Attribute>,
    /// Raw text between the tags.
    pub content: String,
}

/// Parses a markup fragment into a node list.
pub fn parse_markup(source: &str, mode: ParseMode) -> Result<Vec<Node>, MarkupError> {
    let mut builder = TreeBuilder::new(mode);
    for pair in tokenize(source)? {
        builder.token(pair)?;
    }
    builder.finish()
}

/// Locates every raw-text element (`script`, `style`) at any depth.
pub fn raw_blocks(source: &str) -> Result<Vec<RawBlock>, MarkupError> {
    let mut blocks = Vec::new();
    for pair in tokenize(source)? {
        if pair.as_rule() != Rule::raw_element {
            continue;
        }
        let span = pair.as_span();
        let mut tag = String::new();
        let mut attributes = Vec::new();
        let mut content = String::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::raw_tag => tag = inner.as_str().to_ascii_lowercase(),
                Rule::attributes => attributes = parse_attributes(inner),
                Rule::raw_text => content = inner.as_str().to_string(),
                _ => {}
            }
        }
        blocks.push(RawBlock {
            tag,
            start: span.start(),
            end: span.end(),
            attributes,
            content,
        });
    }
    Ok(blocks)
}

fn tokenize(source: &str) -> Result<Pairs<'_, Rule>, MarkupError> {
    let mut pairs = MarkupParser::parse(Rule::markup, source).map_err(|e| {
        let (line, column) = match e.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        MarkupError::Syntax {
            message: e.variant.message().to_string(),
            line,
            column,
        }
    })?;
    pairs
        .next()
        .map(Pair::into_inner)
        .ok_or_else(|| MarkupError::Syntax {
            message: "empty token stream".to_string(),
            line: 1,
            column: 1,
        })
}

fn parse_attributes(pair: Pair<'_, Rule>) -> Vec<Attribute> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::attribute)
        .map(|attr| {
            let mut inner = attr.into_inner();
            let name = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            let value = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            Attribute { name, value }
        })
        .collect()
}

struct OpenElement {
    element: Element,
    line: usize,
    column: usize,
}

struct TreeBuilder {
    mode: ParseMode,
    root: Vec<Node>,
    stack: Vec<OpenElement>,
}

impl TreeBuilder {
    fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn strict(&self) -> bool {
        self.mode == ParseMode::Strict
    }

    fn append(&mut self, node: Node) {
        let children = match self.stack.last_mut() {
            Some(open) => &mut open.element.children,
            None => &mut self.root,
        };
        // adjacent text tokens are merged
        if let (Node::Text(new), Some(Node::Text(last))) = (&node, children.last_mut()) {
            last.push_str(new);
            return;
        }
        children.push(node);
    }

    fn token(&mut self, pair: Pair<'_, Rule>) -> Result<(), MarkupError> {
        let (line, column) = pair.line_col();
        match pair.as_rule() {
            Rule::text => self.append(Node::Text(pair.as_str().to_string())),
            Rule::comment | Rule::cdata | Rule::doctype | Rule::processing => {
                if self.strict() {
                    return Err(MarkupError::UnsupportedNode {
                        kind: node_kind(pair.as_rule()),
                        line,
                        column,
                    });
                }
            }
            Rule::raw_element => {
                let mut element = Element::default();
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::raw_tag => element.name = inner.as_str().to_ascii_lowercase(),
                        Rule::attributes => element.attributes = parse_attributes(inner),
                        Rule::raw_text if !inner.as_str().is_empty() => {
                            element.children.push(Node::Text(inner.as_str().to_string()))
                        }
                        _ => {}
                    }
                }
                self.append(Node::Element(element));
            }
            Rule::start_tag => {
                let mut element = Element::default();
                let mut self_closing = false;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::tag_name => element.name = inner.as_str().to_ascii_lowercase(),
                        Rule::attributes => element.attributes = parse_attributes(inner),
                        Rule::self_closing => self_closing = true,
                        _ => {}
                    }
                }
                if self_closing || is_void_element(&element.name) {
                    self.append(Node::Element(element));
                } else {
                    self.stack.push(OpenElement { element, line, column });
                }
            }
            Rule::end_tag => {
                let name = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_ascii_lowercase())
                    .unwrap_or_default();
                self.close(&name, line, column)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str, line: usize, column: usize) -> Result<(), MarkupError> {
        if is_void_element(name) {
            return Ok(());
        }
        let Some(index) = self.stack.iter().rposition(|open| open.element.name == name) else {
            if !self.strict() {
                return Ok(());
            }
            if name == SECTION_TAG {
                return Err(MarkupError::SectionNesting {
                    detail: "section closed without being opened".to_string(),
                    line,
                    column,
                });
            }
            return Err(MarkupError::UnexpectedEndTag {
                name: name.to_string(),
                line,
                column,
            });
        };

        if self.strict() && index + 1 < self.stack.len() {
            let crosses_section = name == SECTION_TAG
                || self.stack[index + 1..]
                    .iter()
                    .any(|open| open.element.name == SECTION_TAG);
            if crosses_section {
                return Err(MarkupError::SectionNesting {
                    detail: format!("</{}> closes across a section boundary", name),
                    line,
                    column,
                });
            }
        }

        while self.stack.len() > index {
            if let Some(open) = self.stack.pop() {
                self.append(Node::Element(open.element));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Node>, MarkupError> {
        while let Some(open) = self.stack.pop() {
            if self.strict() && open.element.name == SECTION_TAG {
                return Err(MarkupError::SectionNesting {
                    detail: "section is never closed".to_string(),
                    line: open.line,
                    column: open.column,
                });
            }
            self.append(Node::Element(open.element));
        }
        Ok(self.root)
    }
}

fn node_kind(rule: Rule) -> &'static str {
    match rule {
        Rule::comment => "comment",
        Rule::cdata => "cdata",
        Rule::doctype => "doctype",
        Rule::processing => "processing-instruction",
        _ => "unknown",
    }
}
