//! Trailing whitespace detection and removal
//!
//! Whitespace runs are single leaves, so a run covering a line break carries
//! the trailing spaces of the line it ends. Every segment before a newline
//! with spaces or tabs left over is reported; the fix rewrites the leaf with
//! those segments trimmed, keeping the indentation after the last newline
//! untouched.

use crate::engine::{Check, CheckFailure, TraversalContext};
use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::warnings::TRAILING_WHITESPACE;

pub struct TrailingWhitespaceCheck;

impl Check for TrailingWhitespaceCheck {
    fn id(&self) -> &'static str {
        TRAILING_WHITESPACE.id
    }

    fn interests(&self) -> &'static [SyntaxKind] {
        &[SyntaxKind::Whitespace]
    }

    fn visit(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        ctx: &mut TraversalContext,
    ) -> Result<(), CheckFailure> {
        let text = tree.leaf_text(node).unwrap_or("");
        let is_last_leaf = tree.leaves(tree.root()).last() == Some(node);

        let segments: Vec<&str> = text.split('\n').collect();
        let mut bad_lines = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let before_newline = i + 1 < segments.len();
            if segment.is_empty() {
                continue;
            }
            // The run after the last newline is the next line's indentation,
            // unless nothing follows it in the file.
            if !before_newline && !is_last_leaf {
                continue;
            }
            bad_lines.push(i);
        }
        if bad_lines.is_empty() {
            return Ok(());
        }

        let fixed: String = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i + 1 < segments.len() || is_last_leaf {
                    segment.trim_end()
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let (leaf_line, leaf_col) = tree.line_col(node);
        for i in bad_lines {
            let column = if i == 0 { leaf_col } else { 1 };
            let fixed = fixed.clone();
            ctx.report_at(
                node,
                leaf_line + i,
                column,
                &TRAILING_WHITESPACE,
                TRAILING_WHITESPACE.message.to_string(),
                Some(Box::new(move |t: &mut SyntaxTree| {
                    if fixed.is_empty() {
                        t.remove_node(node);
                    } else {
                        t.set_leaf_text(node, fixed);
                    }
                })),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LintConfig;
    use crate::engine::LintEngine;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, fix: bool) -> (Vec<crate::diagnostic::Diagnostic>, String) {
        let mut tree = parse(src, false).unwrap();
        let mut engine = LintEngine::new(LintConfig::new());
        engine.register_check(Box::new(TrailingWhitespaceCheck));
        let out = engine.run(&mut tree, Path::new("t.kt"), fix);
        assert!(out.failure.is_none());
        (out.diagnostics, tree.text())
    }

    #[test]
    fn test_clean_file_reports_nothing() {
        let (diags, _) = run("fun f() {\n    val x = 1\n}\n", false);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_trailing_spaces_reported_and_fixed() {
        let src = "fun f() {   \n    val x = 1\n}\n";
        let (diags, fixed) = run(src, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 1);
        assert_eq!(fixed, "fun f() {\n    val x = 1\n}\n");
    }

    #[test]
    fn test_blank_line_with_spaces() {
        let src = "fun f() {\n    \n    val x = 1\n}\n";
        let (diags, fixed) = run(src, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert_eq!(fixed, "fun f() {\n\n    val x = 1\n}\n");
    }

    #[test]
    fn test_indentation_not_flagged() {
        let (diags, _) = run("fun f() {\n    val x = 1\n}\n", false);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_trailing_spaces_at_end_of_file() {
        let src = "fun f() {\n}\n   ";
        let (diags, fixed) = run(src, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(fixed, "fun f() {\n}\n");
    }

    #[test]
    fn test_fix_is_idempotent() {
        let src = "fun f() {  \n    \n}   \n";
        let (_, once) = run(src, true);
        let (diags, twice) = run(&once, true);
        assert!(diags.is_empty());
        assert_eq!(once, twice);
    }
}
