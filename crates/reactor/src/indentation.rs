// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Base indentation of a code block.

/// Returns the leading whitespace (spaces and tabs) of the first non-blank
/// line of `code`, or `""` when every line is blank.
///
/// Declarations are only recognized at exactly this indentation, so nested
/// bodies never leak into the top-level declaration lists.
pub fn base_indentation(code: &str) -> &str {
    code.lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| {
            let trimmed = line.trim_start_matches([' ', '\t']);
            &line[..line.len() - trimmed.len()]
        })
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_blank_line_wins() {
        let code = "\n   \n    local a = 1\n        local b = 2\n";
        assert_eq!(base_indentation(code), "    ");
    }

    #[test]
    fn test_tabs() {
        assert_eq!(base_indentation("\t\tfunction f() end"), "\t\t");
    }

    #[test]
    fn test_blank_code() {
        assert_eq!(base_indentation(""), "");
        assert_eq!(base_indentation("\n \n\t\n"), "");
    }

    #[test]
    fn test_unindented() {
        assert_eq!(base_indentation("local x = 1\n  local y"), "");
    }
}
