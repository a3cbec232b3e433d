//! Indentation inference and fixing
//!
//! For every line start the check computes the indentation the layout rules
//! require and compares it with the actual width. The base width follows
//! nesting depth (blocks, multi-line parameter/argument lists); because many
//! constructs allow alternative layouts, the base is passed through an
//! ordered list of exception checkers. Checkers run in a fixed priority
//! order and the first match wins:
//!
//! 1. assignment continuation (wrapped right-hand side, +1 unit)
//! 2. parameter/argument list (aligned to the first parameter's column when
//!    `aligned-parameters` is set and one was given on the opening line,
//!    otherwise +1 unit, or +2 with `extended-indent-of-parameters`)
//! 3. operator continuation (+1 unit, or +2 with
//!    `extended-indent-after-operators`)
//! 4. super-type list continuation (+1 unit, +2 when the colon starts its
//!    own line)
//! 5. member-access continuation (+1 unit, or +2 with
//!    `extended-indent-before-dot`)
//!
//! Documentation-block continuation lines are handled inside the comment
//! leaf: each ` * ` line expects the block's indentation plus one space.
//!
//! A line whose actual width matches none of the candidates is reported; in
//! fix mode the highest-priority candidate is written back. The trailing
//! blank line at end of file is tracked independently via `newline-at-end`.

use crate::config::ConfigError;
use crate::engine::{Check, CheckFailure, TraversalContext};
use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::warnings::WRONG_INDENTATION;

/// Parameters read once per file from the configuration
#[derive(Debug, Clone, Copy)]
struct IndentParams {
    unit: usize,
    aligned_parameters: bool,
    extended_parameters: bool,
    extended_operators: bool,
    extended_dot: bool,
    newline_at_end: bool,
}

impl IndentParams {
    fn from_config(ctx: &TraversalContext) -> Result<Self, ConfigError> {
        let id = WRONG_INDENTATION.id;
        let config = ctx.config();
        Ok(Self {
            unit: config.usize_param(id, "indentation-size", 4)?,
            aligned_parameters: config.bool_param(id, "aligned-parameters", false)?,
            extended_parameters: config.bool_param(id, "extended-indent-of-parameters", false)?,
            extended_operators: config.bool_param(id, "extended-indent-after-operators", false)?,
            extended_dot: config.bool_param(id, "extended-indent-before-dot", false)?,
            newline_at_end: config.bool_param(id, "newline-at-end", true)?,
        })
    }

    fn list_step(&self) -> usize {
        if self.extended_parameters {
            2 * self.unit
        } else {
            self.unit
        }
    }

    fn operator_step(&self) -> usize {
        if self.extended_operators {
            2 * self.unit
        } else {
            self.unit
        }
    }

    fn dot_step(&self) -> usize {
        if self.extended_dot {
            2 * self.unit
        } else {
            self.unit
        }
    }
}

/// The indentation check. Registered on the file node; walks every leaf
/// itself so it sees line structure in one pass.
pub struct IndentationCheck;

impl Check for IndentationCheck {
    fn id(&self) -> &'static str {
        WRONG_INDENTATION.id
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
        let params = IndentParams::from_config(ctx)
            .map_err(|e| CheckFailure::new(WRONG_INDENTATION.id, e.to_string()))?;

        let leaves: Vec<NodeId> = tree.leaves(node).collect();

        let mut at_line_start = true;
        let mut indent_ws: Option<NodeId> = None;

        for (i, &leaf) in leaves.iter().enumerate() {
            let kind = tree.kind(leaf);
            let text = tree.leaf_text(leaf).unwrap_or("");

            if kind == SyntaxKind::Whitespace {
                if text.contains('\n') || i == 0 {
                    at_line_start = true;
                    indent_ws = Some(leaf);
                }
                continue;
            }

            if at_line_start {
                let actual = indent_ws
                    .and_then(|w| tree.leaf_text(w))
                    .map(line_indent_width)
                    .unwrap_or(0);
                let candidates = expected_candidates(tree, &leaves, i, &params);
                let primary = candidates[0];

                if !candidates.contains(&actual) {
                    self.report_line(tree, ctx, leaf, indent_ws, actual, primary);
                }

                if kind == SyntaxKind::DocComment && text.contains('\n') {
                    self.check_doc_continuation(tree, ctx, leaf, primary);
                }

                at_line_start = false;
                indent_ws = None;
            }
        }

        self.check_trailing_newline(tree, ctx, node, &params);
        Ok(())
    }
}

impl IndentationCheck {
    fn report_line(
        &self,
        tree: &SyntaxTree,
        ctx: &mut TraversalContext,
        leaf: NodeId,
        indent_ws: Option<NodeId>,
        actual: usize,
        expected: usize,
    ) {
        let (line, _) = tree.line_col(leaf);
        let message =
            WRONG_INDENTATION.format_message(&[&expected.to_string(), &actual.to_string()]);

        let fix = indent_ws.map(|ws| {
            let old = tree.leaf_text(ws).unwrap_or("").to_string();
            let keep = match old.rfind('\n') {
                Some(pos) => old[..=pos].to_string(),
                None => String::new(),
            };
            let replacement = format!("{}{}", keep, " ".repeat(expected));
            Box::new(move |t: &mut SyntaxTree| {
                t.set_leaf_text(ws, replacement);
            }) as Box<dyn FnOnce(&mut SyntaxTree)>
        });

        ctx.report_at(leaf, line, 1, &WRONG_INDENTATION, message, fix);
    }

    /// Continuation lines of a documentation block expect the block's own
    /// indentation plus one space, so the `*` column lines up.
    fn check_doc_continuation(
        &self,
        tree: &SyntaxTree,
        ctx: &mut TraversalContext,
        leaf: NodeId,
        comment_indent: usize,
    ) {
        let text = tree.leaf_text(leaf).unwrap_or("");
        let (first_line, _) = tree.line_col(leaf);
        let expected = comment_indent + 1;

        let mut bad_lines = Vec::new();
        for (offset, line) in text.split('\n').enumerate().skip(1) {
            let actual = line_indent_width(line);
            if actual != expected {
                bad_lines.push((offset, actual));
            }
        }
        if bad_lines.is_empty() {
            return;
        }

        // One rewrite of the whole leaf fixes every continuation line, so the
        // closure is idempotent across the per-line diagnostics.
        let fixed: String = text
            .split('\n')
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    line.to_string()
                } else {
                    format!("{}{}", " ".repeat(expected), line.trim_start())
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        for (offset, actual) in bad_lines {
            let message = WRONG_INDENTATION
                .format_message(&[&expected.to_string(), &actual.to_string()]);
            let fixed = fixed.clone();
            ctx.report_at(
                leaf,
                first_line + offset,
                1,
                &WRONG_INDENTATION,
                message,
                Some(Box::new(move |t: &mut SyntaxTree| {
                    t.set_leaf_text(leaf, fixed);
                })),
            );
        }
    }

    /// The configured presence or absence of a final newline is tracked
    /// independently of per-line indentation.
    fn check_trailing_newline(
        &self,
        tree: &SyntaxTree,
        ctx: &mut TraversalContext,
        root: NodeId,
        params: &IndentParams,
    ) {
        let text = tree.text();
        if text.is_empty() {
            return;
        }
        let last_line = tree.line_index().line_count();

        if params.newline_at_end && !text.ends_with('\n') {
            let last_leaf = tree.leaves(root).last();
            ctx.report_at(
                last_leaf.unwrap_or(root),
                last_line,
                1,
                &WRONG_INDENTATION,
                "file should end with a newline".to_string(),
                Some(Box::new(move |t: &mut SyntaxTree| {
                    let root = t.root();
                    let leaf = t.new_detached_leaf(SyntaxKind::Whitespace, "\n");
                    let end = t.children(root).len();
                    t.insert_node(root, end, leaf);
                })),
            );
        } else if !params.newline_at_end && text.ends_with('\n') {
            let last_leaf = tree.leaves(root).last();
            let fix = last_leaf.and_then(|leaf| {
                let old = tree.leaf_text(leaf)?.to_string();
                let trimmed = old.trim_end_matches('\n').to_string();
                Some(Box::new(move |t: &mut SyntaxTree| {
                    if trimmed.is_empty() {
                        t.remove_node(leaf);
                    } else {
                        t.set_leaf_text(leaf, trimmed);
                    }
                }) as Box<dyn FnOnce(&mut SyntaxTree)>)
            });
            ctx.report_at(
                last_leaf.unwrap_or(root),
                last_line,
                1,
                &WRONG_INDENTATION,
                "file should not end with a blank line".to_string(),
                fix,
            );
        }
    }
}

/// Width of the indentation at the start of the line the whitespace run ends
/// on: the characters after the last newline
fn line_indent_width(ws: &str) -> usize {
    match ws.rfind('\n') {
        Some(pos) => ws[pos + 1..].chars().count(),
        None => ws.chars().count(),
    }
}

/// Expected widths for the line starting at `leaves[index]`, highest
/// priority first
fn expected_candidates(
    tree: &SyntaxTree,
    leaves: &[NodeId],
    index: usize,
    params: &IndentParams,
) -> Vec<usize> {
    let leaf = leaves[index];
    let text = tree.leaf_text(leaf).unwrap_or("");

    // Base width: one unit per enclosing block; the closing brace aligns
    // with the block owner.
    let mut block_depth = tree
        .ancestors(leaf)
        .filter(|&a| tree.kind(a) == SyntaxKind::Block)
        .count();
    if text == "}" && block_depth > 0 {
        block_depth -= 1;
    }
    let base = block_depth * params.unit;

    // Every enclosing multi-line parameter/argument list adds a step.
    let lists: Vec<NodeId> = tree
        .ancestors(leaf)
        .filter(|&a| {
            matches!(
                tree.kind(a),
                SyntaxKind::ParamList | SyntaxKind::ValueArgList
            ) && tree.text_of(a).contains('\n')
        })
        .collect();
    let ambient = base + lists.len() * params.list_step();

    let prev = prev_significant(tree, leaves, index);
    let prev_text = prev.and_then(|p| tree.leaf_text(p)).unwrap_or("");

    // 1. Assignment continuation: wrapped right-hand side
    if prev_text == "=" {
        return vec![ambient + params.unit];
    }

    // 2. Parameter/argument list
    if let Some(&nearest) = lists.first() {
        if text == ")" && tree.parent(leaf) == Some(nearest) {
            return vec![ambient - params.list_step()];
        }
        let mut candidates = Vec::new();
        if params.aligned_parameters {
            if let Some(col) = first_item_alignment(tree, nearest) {
                candidates.push(col);
            }
        }
        candidates.push(ambient);
        return candidates;
    }

    // 3. Operator continuation: line starts with, or follows, a binary
    // operator
    let starts_with_operator = tree.kind(leaf) == SyntaxKind::Operator && text != "!";
    let follows_operator = prev
        .map(|p| tree.kind(p) == SyntaxKind::Operator && tree.leaf_text(p) != Some("!"))
        .unwrap_or(false);
    if starts_with_operator || follows_operator {
        return vec![ambient + params.operator_step()];
    }

    // 4. Super-type list continuation
    if text == ":" && next_in_super_type_list(tree, leaves, index) {
        return vec![base + params.unit];
    }
    if let Some(list) = tree
        .ancestors(leaf)
        .find(|&a| tree.kind(a) == SyntaxKind::SuperTypeList)
    {
        let step = if colon_starts_line(tree, leaves, list) {
            2 * params.unit
        } else {
            params.unit
        };
        return vec![base + step];
    }

    // 5. Member-access continuation
    if text == "." {
        return vec![ambient + params.dot_step()];
    }

    vec![ambient]
}

/// Previous non-trivia leaf before `leaves[index]`
fn prev_significant(tree: &SyntaxTree, leaves: &[NodeId], index: usize) -> Option<NodeId> {
    leaves[..index]
        .iter()
        .rev()
        .copied()
        .find(|&l| !tree.kind(l).is_trivia())
}

/// Column (0-based width) of the first list item when it sits on the same
/// line as the opening parenthesis
fn first_item_alignment(tree: &SyntaxTree, list: NodeId) -> Option<usize> {
    let mut leaves = tree.leaves(list);
    let open = leaves.find(|&l| tree.leaf_text(l) == Some("("))?;
    let first_item = leaves.find(|&l| !tree.kind(l).is_trivia())?;
    let (open_line, _) = tree.line_col(open);
    let (item_line, item_col) = tree.line_col(first_item);
    if open_line == item_line && tree.leaf_text(first_item) != Some(")") {
        Some(item_col - 1)
    } else {
        None
    }
}

/// True when the leaf after `leaves[index]` belongs to a super-type list
fn next_in_super_type_list(tree: &SyntaxTree, leaves: &[NodeId], index: usize) -> bool {
    leaves[index + 1..]
        .iter()
        .copied()
        .find(|&l| !tree.kind(l).is_trivia())
        .map(|l| {
            tree.ancestors(l)
                .any(|a| tree.kind(a) == SyntaxKind::SuperTypeList)
        })
        .unwrap_or(false)
}

/// True when the colon introducing the super-type list starts its own line
fn colon_starts_line(tree: &SyntaxTree, leaves: &[NodeId], list: NodeId) -> bool {
    let Some(class) = tree
        .ancestors(list)
        .find(|&a| tree.kind(a) == SyntaxKind::ClassDecl)
    else {
        return false;
    };
    let Some(colon) = tree
        .children(class)
        .iter()
        .copied()
        .find(|&c| tree.leaf_text(c) == Some(":"))
    else {
        return false;
    };
    let Some(pos) = leaves.iter().position(|&l| l == colon) else {
        return false;
    };
    leaves[..pos]
        .iter()
        .rev()
        .copied()
        .find(|&l| tree.kind(l) == SyntaxKind::Whitespace || !tree.kind(l).is_trivia())
        .map(|l| {
            tree.kind(l) == SyntaxKind::Whitespace
                && tree.leaf_text(l).map(|t| t.contains('\n')).unwrap_or(false)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LintConfig, RuleConfigEntry};
    use crate::engine::LintEngine;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, config: LintConfig, fix: bool) -> (Vec<crate::diagnostic::Diagnostic>, String) {
        let mut tree = parse(src, false).unwrap();
        let mut engine = LintEngine::new(config);
        engine.register_check(Box::new(IndentationCheck));
        let out = engine.run(&mut tree, Path::new("t.kt"), fix);
        assert!(out.failure.is_none());
        (out.diagnostics, tree.text())
    }

    #[test]
    fn test_correct_file_reports_nothing() {
        let src = "class Foo {\n    fun bar(x: Int): Int {\n        val y = x + 1\n        return y\n    }\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_wrong_member_indent_reported() {
        let src = "class Foo {\n  fun bar() {\n    }\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        // Expected widths come from the tree, so only the fun line is off
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert!(diags[0].message.contains("expected an indentation of 4"));
    }

    #[test]
    fn test_fix_rewrites_indent() {
        let src = "class Foo {\n  fun bar() {\n  }\n}\n";
        let (diags, fixed) = run(src, LintConfig::new(), true);
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|d| d.can_be_auto_corrected));
        assert_eq!(fixed, "class Foo {\n    fun bar() {\n    }\n}\n");
    }

    #[test]
    fn test_fix_is_idempotent() {
        let src = "class Foo {\n  fun bar() {\n  }\n}\n";
        let (_, once) = run(src, LintConfig::new(), true);
        let (diags, twice) = run(&once, LintConfig::new(), true);
        assert!(diags.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_assignment_continuation() {
        let src = "fun f() {\n    val x =\n        compute()\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_chained_call_continuation() {
        let src = "fun f() {\n    val x = builder()\n        .build()\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_extended_indent_before_dot() {
        let src = "fun f() {\n    val x = builder()\n            .build()\n}\n";
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation").with_param("extended-indent-before-dot", "true"),
        );
        let (diags, _) = run(src, config, false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_operator_continuation() {
        let src = "fun f() {\n    val x = 1 +\n        2\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_multiline_parameter_list() {
        let src = "fun f(\n    x: Int,\n    y: Int\n) {\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_aligned_parameters_accepted() {
        let src = "fun f(x: Int,\n      y: Int) {\n}\n";
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation").with_param("aligned-parameters", "true"),
        );
        let (diags, _) = run(src, config, false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_super_type_list_continuation() {
        let src = "class Foo : Base(),\n    Marker {\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_super_type_list_colon_on_own_line() {
        let src = "class Foo\n    : Base(),\n        Marker {\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_doc_comment_continuation() {
        let src = "class Foo {\n    /**\n     * Does things.\n     */\n    fun bar() {\n    }\n}\n";
        let (diags, _) = run(src, LintConfig::new(), false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }

    #[test]
    fn test_doc_comment_continuation_fixed() {
        let src = "/**\n* Does things.\n*/\nfun bar() {\n}\n";
        let (diags, fixed) = run(src, LintConfig::new(), true);
        assert!(!diags.is_empty());
        assert_eq!(fixed, "/**\n * Does things.\n */\nfun bar() {\n}\n");
    }

    #[test]
    fn test_missing_final_newline() {
        let src = "fun f() {\n}";
        let (diags, fixed) = run(src, LintConfig::new(), true);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("end with a newline"));
        assert_eq!(fixed, "fun f() {\n}\n");
    }

    #[test]
    fn test_final_newline_disabled() {
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation").with_param("newline-at-end", "false"),
        );
        let src = "fun f() {\n}\n";
        let (diags, fixed) = run(src, config, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(fixed, "fun f() {\n}");
    }

    #[test]
    fn test_indentation_size_param() {
        let config = LintConfig::new().with_entry(
            RuleConfigEntry::new("wrong-indentation").with_param("indentation-size", "2"),
        );
        let src = "class Foo {\n  fun bar() {\n  }\n}\n";
        let (diags, _) = run(src, config, false);
        assert!(diags.is_empty(), "unexpected: {:?}", diags);
    }
}
