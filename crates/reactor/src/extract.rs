// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Splits a raw component template into script, style and markup.
//!
//! Extraction works on the token stream only, so it never builds the element
//! tree: script-level errors (such as a redeclared server variable) are
//! reported before the markup itself is parsed.

use crate::error::CompileError;
use crate::parser::raw_blocks;

/// The three parts of a component template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedSource {
    /// Content of the `<script>` block, or empty.
    pub script: String,
    /// Content of the `<style>` block, or empty.
    pub style: String,
    /// Everything else, trimmed.
    pub markup: String,
}

/// Extracts the script and style blocks from a template.
///
/// A template may hold at most one of each, at any depth.
pub fn extract(component: &str, source: &str) -> Result<ExtractedSource, CompileError> {
    let blocks = raw_blocks(source).map_err(|e| CompileError::from_markup(component, source, e))?;

    let mut extracted = ExtractedSource::default();
    let mut script_seen = false;
    let mut style_seen = false;
    let mut markup = String::with_capacity(source.len());
    let mut cursor = 0;

    for block in blocks {
        match block.tag.as_str() {
            "script" if script_seen => return Err(CompileError::MultipleScripts(component.to_string())),
            "style" if style_seen => return Err(CompileError::MultipleStyles(component.to_string())),
            "script" => {
                script_seen = true;
                extracted.script = block.content;
            }
            _ => {
                style_seen = true;
                extracted.style = block.content;
            }
        }
        markup.push_str(&source[cursor..block.start]);
        cursor = block.end;
    }
    markup.push_str(&source[cursor..]);

    extracted.markup = markup.trim().to_string();
    tracing::debug!(
        component,
        script = extracted.script.len(),
        style = extracted.style.len(),
        "extracted template parts"
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_all_parts() {
        let source = "<script>\n    local a = 1\n</script>\n<style>.x { color: red }</style>\n<p>{{a}}</p>\n";
        let parts = extract("Demo", source).unwrap();
        assert_eq!(parts.script, "\n    local a = 1\n");
        assert_eq!(parts.style, ".x { color: red }");
        assert_eq!(parts.markup, "<p>{{a}}</p>");
    }

    #[test]
    fn test_nested_blocks_are_extracted() {
        let parts = extract("Demo", "<div><p>a</p><style>p{}</style></div>").unwrap();
        assert_eq!(parts.style, "p{}");
        assert_eq!(parts.markup, "<div><p>a</p></div>");
    }

    #[test]
    fn test_markup_only() {
        let parts = extract("Demo", "  <p>plain</p>  ").unwrap();
        assert!(parts.script.is_empty());
        assert!(parts.style.is_empty());
        assert_eq!(parts.markup, "<p>plain</p>");
    }

    #[test]
    fn test_two_scripts_rejected() {
        let err = extract("Demo", "<script>a</script><script>b</script>").unwrap_err();
        assert!(matches!(err, CompileError::MultipleScripts(ref name) if name == "Demo"));
    }

    #[test]
    fn test_two_styles_rejected() {
        let err = extract("Demo", "<style>a</style><p></p><style>b</style>").unwrap_err();
        assert_eq!(err.to_string(), "Only one <style> tag allowed in component: Demo");
    }
}
