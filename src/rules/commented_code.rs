//! Commented-out code detection
//!
//! A comment is flagged when its text is disabled source code rather than
//! prose. Candidates are maximal runs of line comments on consecutive lines
//! and individual block comments; documentation blocks are never candidates.
//! Import/package-shaped lines inside a run are split out and tried as
//! directives on their own. The remaining text is only tried as a code
//! fragment when it superficially resembles code (a declaration keyword, an
//! assignment, or a balanced brace pair), and is reported only when the
//! trial reparse finds zero syntax errors. A parse failure is the expected
//! outcome for prose, not an error.

use crate::engine::{Check, CheckFailure, TraversalContext};
use crate::parser;
use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::warnings::COMMENTED_OUT_CODE;
use regex::Regex;

pub struct CommentedCodeCheck {
    directive_line: Regex,
    declaration_keyword: Regex,
    code_start_shape: Regex,
}

impl CommentedCodeCheck {
    pub fn new() -> Self {
        Self {
            directive_line: Regex::new(r"^(import|package)\s+[\w]+(\.[\w*]+)*\s*$")
                .expect("directive pattern is valid"),
            declaration_keyword: Regex::new(r"\b(class|object|fun|val|var|return)\b")
                .expect("keyword pattern is valid"),
            // Shapes a disabled code fragment starts with when the comment
            // itself begins with marker punctuation
            code_start_shape: Regex::new(
                r"^\s*((class|object)\s+\w|fun\s+\w|(import|package)\s+\w|\}\s*$)",
            )
            .expect("code start pattern is valid"),
        }
    }

    /// Declaration keyword, assignment, or a balanced brace pair
    fn resembles_code(&self, fragment: &str) -> bool {
        if self.declaration_keyword.is_match(fragment) || fragment.contains('=') {
            return true;
        }
        let opens = fragment.matches('{').count();
        opens > 0 && opens == fragment.matches('}').count()
    }

    /// A fragment whose first stripped character is marker punctuation is
    /// prose unless it starts with a recognizable code shape
    fn marker_guard(&self, fragment: &str) -> bool {
        let first = fragment.trim_start();
        let Some(c) = first.chars().next() else {
            return false;
        };
        if c.is_alphanumeric() || c == '}' || c == '{' {
            return true;
        }
        self.code_start_shape.is_match(first)
    }

    /// Examine one candidate: (comment leaf, stripped line) pairs in source
    /// order, forming one logical comment text
    fn examine(
        &self,
        tree: &SyntaxTree,
        candidate: &[(NodeId, String)],
        ctx: &mut TraversalContext,
    ) {
        let mut fragment_lines: Vec<(NodeId, &str)> = Vec::new();

        for (leaf, line) in candidate {
            let trimmed = line.trim();
            if self.directive_line.is_match(trimmed) {
                if parser::parses_cleanly(trimmed, false) {
                    self.report(tree, *leaf, trimmed, ctx);
                }
            } else {
                fragment_lines.push((*leaf, line.as_str()));
            }
        }

        let Some(&(first_leaf, _)) = fragment_lines.first() else {
            return;
        };
        let fragment = fragment_lines
            .iter()
            .map(|(_, l)| *l)
            .collect::<Vec<_>>()
            .join("\n");
        if fragment.trim().is_empty() {
            return;
        }
        if !self.resembles_code(&fragment) || !self.marker_guard(&fragment) {
            return;
        }
        if parser::parses_cleanly(&fragment, true) {
            let snippet = fragment
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("")
                .trim();
            self.report(tree, first_leaf, snippet, ctx);
        }
    }

    fn report(&self, _tree: &SyntaxTree, leaf: NodeId, snippet: &str, ctx: &mut TraversalContext) {
        let shown: String = snippet.chars().take(60).collect();
        let message = COMMENTED_OUT_CODE.format_message(&[&shown]);
        ctx.report(leaf, &COMMENTED_OUT_CODE, message, None);
    }
}

impl Default for CommentedCodeCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for CommentedCodeCheck {
    fn id(&self) -> &'static str {
        COMMENTED_OUT_CODE.id
    }

    fn interests(&self) -> &'static [SyntaxKind] {
        &[SyntaxKind::File]
    }

    fn visit(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        ctx: &mut TraversalContext,
    ) -> Result<(), CheckFailure> {
        let leaves: Vec<NodeId> = tree.leaves(node).collect();

        // Runs of line comments on consecutive lines merge into one
        // candidate; anything else in between ends the run.
        let mut run: Vec<(NodeId, String)> = Vec::new();
        let mut separator_newlines = 0usize;

        for &leaf in &leaves {
            match tree.kind(leaf) {
                SyntaxKind::EolComment => {
                    if !run.is_empty() && separator_newlines != 1 {
                        self.examine(tree, &run, ctx);
                        run.clear();
                    }
                    let text = tree.leaf_text(leaf).unwrap_or("");
                    let stripped = text.strip_prefix("//").unwrap_or(text);
                    run.push((leaf, stripped.to_string()));
                    separator_newlines = 0;
                }
                SyntaxKind::Whitespace => {
                    separator_newlines = tree
                        .leaf_text(leaf)
                        .map(|t| t.matches('\n').count())
                        .unwrap_or(0);
                }
                SyntaxKind::BlockComment => {
                    if !run.is_empty() {
                        self.examine(tree, &run, ctx);
                        run.clear();
                    }
                    let candidate = strip_block_comment(tree, leaf);
                    self.examine(tree, &candidate, ctx);
                }
                _ => {
                    if !run.is_empty() {
                        self.examine(tree, &run, ctx);
                        run.clear();
                    }
                }
            }
        }
        if !run.is_empty() {
            self.examine(tree, &run, ctx);
        }
        Ok(())
    }
}

/// Strip the delimiters and per-line `*` markers of a block comment
fn strip_block_comment(tree: &SyntaxTree, leaf: NodeId) -> Vec<(NodeId, String)> {
    let text = tree.leaf_text(leaf).unwrap_or("");
    let inner = text.strip_prefix("/*").unwrap_or(text);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    inner
        .split('\n')
        .map(|line| {
            let trimmed = line.trim_start();
            let without_marker = trimmed.strip_prefix('*').unwrap_or(trimmed);
            (leaf, without_marker.to_string())
        })
        .collect()
}
