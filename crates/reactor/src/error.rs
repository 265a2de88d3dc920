// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the Reactor compiler and runtime.
//!
//! Errors are layered the same way the system is:
//!
//! - [`MarkupError`]: tokenizer and tree-construction failures
//! - [`CompileError`]: anything fatal to one compile (never partial)
//! - [`ProgramError`]: failures of a running component program, routed to
//!   the component's error hook
//! - [`TransportError`]: failed or malformed server round trips
//! - [`ServerError`]: failures while answering a round trip server-side
//! - [`ReactorError`]: the umbrella type seen by hooks and callers
//!
//! # Source Context
//!
//! Markup parse errors carry a [`SourceContext`] so the message shows the
//! offending line with a caret under the reported column.

use std::fmt;
use thiserror::Error;

/// Source context for enhanced error messages.
///
/// Captures a snippet of source code around an error location,
/// enabling rich error messages with line numbers and visual indicators.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 2 lines before and after the error line.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the snippet with line numbers and a caret under the column.
    ///
    /// ```text
    ///    2 | <p>{{#open}}</p>
    ///      |             ^
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            let Some(line) = self.lines.get(line_num - 1) else {
                break;
            };
            result.push_str(&format!("{:4} | {}\n", line_num, line));
            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "\n{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// Failure while tokenizing markup or rebuilding its tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// The tokenizer rejected the input.
    #[error("{message} at line {line}, column {column}")]
    Syntax {
        /// Tokenizer message.
        message: String,
        /// Line (1-indexed).
        line: usize,
        /// Column (1-indexed).
        column: usize,
    },

    /// An end tag with no matching open element.
    #[error("Unexpected end tag : {name} at line {line}, column {column}")]
    UnexpectedEndTag {
        /// Tag name of the stray end tag.
        name: String,
        /// Line (1-indexed).
        line: usize,
        /// Column (1-indexed).
        column: usize,
    },

    /// A section wrapper is not properly nested with its surrounding markup.
    #[error("{detail} at line {line}, column {column}")]
    SectionNesting {
        /// What went wrong.
        detail: String,
        /// Line (1-indexed).
        line: usize,
        /// Column (1-indexed).
        column: usize,
    },

    /// A node that is neither element nor text.
    #[error("Found markup node \"{kind}\" at line {line}, column {column}, not supported")]
    UnsupportedNode {
        /// Node kind (comment, doctype, ...).
        kind: &'static str,
        /// Line (1-indexed).
        line: usize,
        /// Column (1-indexed).
        column: usize,
    },
}

/// A template could not be compiled.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Mustache sections are improperly nested or closed.
    #[error("Error parsing sections for \"{component}\": {detail}. Check they are properly nested and closed.")]
    SectionNesting {
        /// Component being compiled.
        component: String,
        /// What went wrong.
        detail: String,
    },

    /// Generic markup parse failure.
    #[error("Error parsing component \"{component}\": {message} at line {line}, column {column}{}", source_context.as_display())]
    Parse {
        /// Component being compiled.
        component: String,
        /// Description of the parse error.
        message: String,
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        column: usize,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// The markup contains a node kind other than element or text.
    #[error("Found markup node \"{kind}\" in component \"{component}\", not supported")]
    UnsupportedNode {
        /// Component being compiled.
        component: String,
        /// Node kind.
        kind: &'static str,
    },

    /// A script declaration shadows a server variable.
    #[error("Cannot redeclare server variable {name} in client code of component \"{component}\"")]
    ServerVariableRedeclared {
        /// Component being compiled.
        component: String,
        /// Offending variable name.
        name: String,
    },

    /// More than one `<script>` block.
    #[error("Only one <script> tag allowed in component: {0}")]
    MultipleScripts(String),

    /// More than one `<style>` block.
    #[error("Only one <style> tag allowed in component: {0}")]
    MultipleStyles(String),

    /// A server variable name is not a valid identifier.
    #[error("Invalid server variable name \"{name}\" in component \"{component}\"")]
    InvalidVariableName {
        /// Component being compiled.
        component: String,
        /// Offending name.
        name: String,
    },
}

impl CompileError {
    /// True for the section nesting diagnostic, as opposed to generic parse failures.
    pub fn is_section_nesting(&self) -> bool {
        matches!(self, CompileError::SectionNesting { .. })
    }

    pub(crate) fn from_markup(component: &str, source: &str, err: MarkupError) -> Self {
        let component = component.to_string();
        match err {
            MarkupError::SectionNesting { detail, .. } => CompileError::SectionNesting { component, detail },
            MarkupError::UnsupportedNode { kind, .. } => CompileError::UnsupportedNode { component, kind },
            MarkupError::Syntax { message, line, column } => CompileError::Parse {
                component,
                message,
                line,
                column,
                source_context: Some(SourceContext::from_source(source, line, column)),
            },
            MarkupError::UnexpectedEndTag { name, line, column } => CompileError::Parse {
                component,
                message: format!("Unexpected end tag : {}", name),
                line,
                column,
                source_context: Some(SourceContext::from_source(source, line, column)),
            },
        }
    }
}

/// A running component program failed (unknown names, render failures, ...).
#[derive(Error, Debug)]
pub enum ProgramError {
    /// No client or server variable with that name.
    #[error("Undefined variable {name} in component {component}")]
    UnknownVariable {
        /// Component key.
        component: String,
        /// Requested name.
        name: String,
    },

    /// No server variable with that name.
    #[error("Undefined server variable {name} in component {component}")]
    UnknownServerVariable {
        /// Component key.
        component: String,
        /// Requested name.
        name: String,
    },

    /// No declared function with that name.
    #[error("Undefined function {name} in component {component}")]
    UnknownFunction {
        /// Component key.
        component: String,
        /// Requested name.
        name: String,
    },

    /// Rendering a markup fragment failed.
    #[error("Error rendering {what} for component \"{component}\": {message}")]
    Render {
        /// Which fragment (template, section, attribute ...).
        what: String,
        /// Component name.
        component: String,
        /// Underlying message.
        message: String,
    },

    /// The program source did not evaluate to a factory.
    #[error("Cannot instantiate program of component \"{component}\": {message}")]
    Instantiate {
        /// Component name.
        component: String,
        /// Underlying message.
        message: String,
    },

    /// A stable identifier is missing from the original markup.
    #[error("No fragment {reactor_id} in template of component \"{component}\"")]
    MissingFragment {
        /// Component name.
        component: String,
        /// Stable identifier.
        reactor_id: String,
    },

    /// The component's mount node is no longer in the document.
    #[error("Node #{node} of component {component} is no longer in the document")]
    NodeDetached {
        /// Component key.
        component: String,
        /// Mount node id.
        node: String,
    },

    /// Re-parsing rendered markup failed.
    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    /// Lua runtime error raised by user code.
    #[error("Lua execution error: {0}")]
    Lua(#[from] mlua::Error),
}

/// A server round trip failed.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Non-success HTTP status.
    #[error("Reactor server error, status: {status} {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Status text or body excerpt.
        reason: String,
    },

    /// The body is not a valid response document.
    #[error("Cannot parse response from server: {0}")]
    Malformed(String),

    /// The server answered with an explicit `error` field.
    #[error("Error detected on the server: {0}")]
    Server(String),

    /// The request could not be performed.
    #[error("Request failed: {0}")]
    Request(String),
}

/// Failure while answering a round trip on the server side.
#[derive(Error, Debug)]
pub enum ServerError {
    /// `mode` query parameter missing or unknown.
    #[error("Invalid render mode \"{0}\", expected \"ssr\" or \"csr\"")]
    InvalidMode(String),

    /// `component` query parameter missing.
    #[error("Missing component name")]
    MissingComponent,

    /// No component registered under that name.
    #[error("Component \"{0}\" not found")]
    UnknownComponent(String),

    /// A posted server variable is not valid JSON.
    #[error("Invalid value for server variable {name}: {message}")]
    InvalidVariable {
        /// Variable name.
        name: String,
        /// Decoder message.
        message: String,
    },

    /// The component's server-side hook failed.
    #[error("Component \"{component}\" failed: {message}")]
    Component {
        /// Component name.
        component: String,
        /// Hook message.
        message: String,
    },

    /// The template failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// The umbrella error type seen by hooks and callers of the orchestrator.
#[derive(Error, Debug)]
pub enum ReactorError {
    /// Template compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A component program failed.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// A server round trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid host configuration, raised before any component runs.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No route matches the component name.
    #[error("Route not found for component \"{0}\"")]
    RouteNotFound(String),

    /// No live component under that key.
    #[error("Component {0} is not registered")]
    ComponentNotFound(String),
}

impl From<mlua::Error> for ReactorError {
    fn from(err: mlua::Error) -> Self {
        ReactorError::Program(ProgramError::Lua(err))
    }
}

/// Convenience type alias for Results with [`ReactorError`].
pub type Result<T> = std::result::Result<T, ReactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_nesting_message() {
        let err = CompileError::from_markup(
            "Menu",
            "",
            MarkupError::SectionNesting {
                detail: "section is never closed".into(),
                line: 1,
                column: 1,
            },
        );
        assert!(err.is_section_nesting());
        assert_eq!(
            err.to_string(),
            "Error parsing sections for \"Menu\": section is never closed. Check they are properly nested and closed."
        );
    }

    #[test]
    fn test_parse_error_has_snippet() {
        let source = "<p>one</p>\n<p>two</p></div>\n<p>three</p>";
        let err = CompileError::from_markup(
            "Menu",
            source,
            MarkupError::UnexpectedEndTag {
                name: "div".into(),
                line: 2,
                column: 11,
            },
        );
        assert!(!err.is_section_nesting());
        let message = err.to_string();
        assert!(message.contains("Unexpected end tag : div"));
        assert!(message.contains("   2 | <p>two</p></div>"));
        assert!(message.contains("^"));
    }

    #[test]
    fn test_lua_error_maps_to_program_error() {
        let err: ReactorError = mlua::Error::RuntimeError("boom".into()).into();
        assert!(matches!(err, ReactorError::Program(ProgramError::Lua(_))));
    }
}
