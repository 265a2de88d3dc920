// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pluggable mustache rendering.
//!
//! The runtime never interprets mustache itself; it hands template text and
//! the component variables to a [`TemplateEngine`]. [`Mustache`] is the
//! built-in engine covering the subset the compiler understands:
//!
//! - `{{name}}` (escaped), `{{{name}}}` and `{{&name}}` (raw)
//! - `{{#name}}..{{/name}}` over booleans, lists and objects
//! - `{{^name}}..{{/name}}` (inverted)
//! - dotted names, `{{.}}` and `{{! comments }}`

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Variables handed to the renderer.
pub type VarMap = Map<String, JsonValue>;

/// A template could not be rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Render function for the mustache subset.
pub trait TemplateEngine {
    /// Renders `template` with `vars`.
    fn render(&self, template: &str, vars: &VarMap) -> Result<String, RenderError>;
}

impl<F> TemplateEngine for F
where
    F: Fn(&str, &VarMap) -> Result<String, RenderError>,
{
    fn render(&self, template: &str, vars: &VarMap) -> Result<String, RenderError> {
        self(template, vars)
    }
}

/// Built-in mustache engine. Unknown names render as empty strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mustache;

impl TemplateEngine for Mustache {
    fn render(&self, template: &str, vars: &VarMap) -> Result<String, RenderError> {
        let tokens = parse(template)?;
        let root = JsonValue::Object(vars.clone());
        let mut stack = vec![&root];
        let mut out = String::with_capacity(template.len());
        render_tokens(&tokens, &mut stack, &mut out);
        Ok(out)
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Var { name: &'a str, escaped: bool },
    Section { name: &'a str, inverted: bool, children: Vec<Token<'a>> },
}

fn parse(template: &str) -> Result<Vec<Token<'_>>, RenderError> {
    // (section name, inverted, tokens collected so far)
    let mut frames: Vec<(&str, bool, Vec<Token<'_>>)> = vec![("", false, Vec::new())];
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let current = &mut frames.last_mut().ok_or_else(unbalanced)?.2;
        if open > 0 {
            current.push(Token::Text(&rest[..open]));
        }
        let after = &rest[open + 2..];

        if let Some(body) = after.strip_prefix('{') {
            let close = body
                .find("}}}")
                .ok_or_else(|| RenderError("Unclosed tag {{{".to_string()))?;
            current.push(Token::Var {
                name: body[..close].trim(),
                escaped: false,
            });
            rest = &body[close + 3..];
            continue;
        }

        let close = after
            .find("}}")
            .ok_or_else(|| RenderError("Unclosed tag {{".to_string()))?;
        let tag = after[..close].trim();
        rest = &after[close + 2..];

        let mut chars = tag.chars();
        match chars.next() {
            Some('!') => {}
            Some('&') => current.push(Token::Var {
                name: chars.as_str().trim(),
                escaped: false,
            }),
            Some(sigil @ ('#' | '^')) => frames.push((chars.as_str().trim(), sigil == '^', Vec::new())),
            Some('/') => {
                let name = chars.as_str().trim();
                let (open_name, inverted, children) = frames.pop().ok_or_else(unbalanced)?;
                if frames.is_empty() || open_name != name {
                    return Err(RenderError(format!(
                        "Unclosed section \"{}\" closed by \"{}\"",
                        open_name, name
                    )));
                }
                frames
                    .last_mut()
                    .ok_or_else(unbalanced)?
                    .2
                    .push(Token::Section {
                        name: open_name,
                        inverted,
                        children,
                    });
            }
            Some('>') => return Err(RenderError(format!("Partials are not supported: {}", tag))),
            Some('=') => return Err(RenderError("Delimiter changes are not supported".to_string())),
            _ => current.push(Token::Var { name: tag, escaped: true }),
        }
    }

    if !rest.is_empty() {
        frames.last_mut().ok_or_else(unbalanced)?.2.push(Token::Text(rest));
    }
    match frames.pop() {
        Some(("", false, tokens)) if frames.is_empty() => Ok(tokens),
        Some((name, _, _)) => Err(RenderError(format!("Unclosed section \"{}\"", name))),
        None => Err(unbalanced()),
    }
}

fn unbalanced() -> RenderError {
    RenderError("Unbalanced sections".to_string())
}

fn render_tokens<'v>(tokens: &[Token<'_>], stack: &mut Vec<&'v JsonValue>, out: &mut String) {
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Var { name, escaped } => {
                if let Some(value) = lookup(stack, name) {
                    let text = to_text(value);
                    if *escaped {
                        out.push_str(&escape_html(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
            }
            Token::Section { name, inverted, children } => {
                let value = lookup(stack, name);
                if *inverted {
                    if !value.is_some_and(is_truthy) {
                        render_tokens(children, stack, out);
                    }
                    continue;
                }
                match value {
                    Some(JsonValue::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_tokens(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(value) if is_truthy(value) => {
                        stack.push(value);
                        render_tokens(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'v>(stack: &[&'v JsonValue], name: &str) -> Option<&'v JsonValue> {
    if name == "." {
        return stack.last().copied();
    }
    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = stack
        .iter()
        .rev()
        .find_map(|ctx| ctx.as_object().and_then(|obj| obj.get(first)))?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

/// Mustache truthiness: null, false, "", 0 and empty lists are falsy.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(_) => true,
    }
}

fn to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Escapes text for inclusion in markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
