//! Declaration-to-first-use distance
//!
//! Flags local declarations that sit textually far from their first use.
//! Only declarations whose initializer cannot have observable side effects
//! are eligible: an absent initializer, a literal, or a call to one of the
//! empty-collection constructors with literal arguments. Moving anything
//! else would reorder effects.
//!
//! The placement of a declaration is judged against its comparison point:
//! the statement in the same block containing the first use, or the
//! enclosing top-level statement when the first use sits in a nested block.
//! Declarations sharing one comparison point (first used together) form a
//! group and are only required to sit on consecutive lines; blank lines,
//! comment lines and ineligible declarations in between are discounted.

use crate::engine::{Check, CheckFailure, TraversalContext};
use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::warnings::DECLARATION_FAR_FROM_USAGE;
use std::collections::{BTreeMap, HashSet};

/// Collection constructors without observable side effects
const NO_SIDE_EFFECT_CTORS: &[&str] = &[
    "emptyList",
    "emptyMap",
    "emptySet",
    "listOf",
    "mapOf",
    "setOf",
    "mutableListOf",
    "mutableMapOf",
    "mutableSetOf",
];

pub struct DeclarationDistanceCheck;

impl Check for DeclarationDistanceCheck {
    fn id(&self) -> &'static str {
        DECLARATION_FAR_FROM_USAGE.id
    }

    fn interests(&self) -> &'static [SyntaxKind] {
        &[SyntaxKind::Block]
    }

    fn visit(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        ctx: &mut TraversalContext,
    ) -> Result<(), CheckFailure> {
        let statements: Vec<NodeId> = tree
            .children(node)
            .iter()
            .copied()
            .filter(|&c| tree.kind(c).is_statement())
            .collect();

        struct Candidate {
            decl: NodeId,
            name: String,
            use_stmt: NodeId,
            use_line: usize,
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut ineligible_lines: HashSet<usize> = HashSet::new();

        for (i, &stmt) in statements.iter().enumerate() {
            if tree.kind(stmt) != SyntaxKind::PropertyDecl {
                continue;
            }
            let Some(name) = property_name(tree, stmt) else {
                continue;
            };
            if !is_eligible(tree, stmt) {
                let (first, _) = tree.line_col(stmt);
                let last = last_line(tree, stmt);
                ineligible_lines.extend(first..=last);
                continue;
            }
            if let Some((use_stmt, ident)) = first_use(tree, &statements[i + 1..], &name) {
                candidates.push(Candidate {
                    decl: stmt,
                    name,
                    use_stmt,
                    use_line: tree.line_col(ident).0,
                });
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }

        let text = tree.text();
        let lines: Vec<&str> = text.split('\n').collect();
        let skippable = |line: usize| -> bool {
            if ineligible_lines.contains(&line) {
                return true;
            }
            let content = lines.get(line - 1).map(|l| l.trim()).unwrap_or("");
            content.is_empty()
                || content.starts_with("//")
                || content.starts_with("/*")
                || content.starts_with('*')
        };
        let gap_is_clean = |from_line: usize, to_line: usize| -> bool {
            (from_line + 1..to_line).all(&skippable)
        };

        // Candidates sharing a comparison point form a group.
        let mut groups: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
        for (i, c) in candidates.iter().enumerate() {
            groups.entry(c.use_stmt).or_default().push(i);
        }

        let mut offending: Vec<usize> = Vec::new();
        for (&use_stmt, members) in &groups {
            if members.len() == 1 {
                let c = &candidates[members[0]];
                let point_line = tree.line_col(use_stmt).0;
                if !gap_is_clean(last_line(tree, c.decl), point_line) {
                    offending.push(members[0]);
                }
            } else {
                // Group members must sit on consecutive lines; their distance
                // to the shared first use is not judged individually.
                for pair in members.windows(2) {
                    let a = &candidates[pair[0]];
                    let b = &candidates[pair[1]];
                    let b_line = tree.line_col(b.decl).0;
                    if !gap_is_clean(last_line(tree, a.decl), b_line) {
                        offending.push(pair[0]);
                    }
                }
            }
        }

        offending.sort_by_key(|&i| tree.offset(candidates[i].decl));
        offending.dedup();
        for i in offending {
            let c = &candidates[i];
            let decl_line = tree.line_col(c.decl).0;
            let message = DECLARATION_FAR_FROM_USAGE.format_message(&[
                &c.name,
                &decl_line.to_string(),
                &c.use_line.to_string(),
            ]);
            ctx.report(c.decl, &DECLARATION_FAR_FROM_USAGE, message, None);
        }
        Ok(())
    }
}

/// Declared name of a property: its first identifier child
fn property_name(tree: &SyntaxTree, decl: NodeId) -> Option<String> {
    tree.children(decl)
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == SyntaxKind::Identifier)
        .and_then(|c| tree.leaf_text(c))
        .map(|s| s.to_string())
}

/// Line of the last leaf of a subtree
fn last_line(tree: &SyntaxTree, node: NodeId) -> usize {
    tree.leaves(node)
        .last()
        .map(|l| tree.line_col(l).0)
        .unwrap_or_else(|| tree.line_col(node).0)
}

/// Initializer absent, a single literal, or a whitelisted constructor call
/// with literal arguments
fn is_eligible(tree: &SyntaxTree, decl: NodeId) -> bool {
    let children = tree.children(decl);
    let Some(eq) = children.iter().position(|&c| tree.leaf_text(c) == Some("=")) else {
        return true;
    };
    let init: Vec<NodeId> = children[eq + 1..]
        .iter()
        .copied()
        .filter(|&c| !tree.kind(c).is_trivia())
        .collect();
    if init.len() != 1 {
        return false;
    }
    let node = init[0];
    match tree.kind(node) {
        SyntaxKind::Literal => true,
        SyntaxKind::CallExpr => {
            let callee_whitelisted = tree
                .children(node)
                .first()
                .and_then(|&c| tree.leaf_text(c))
                .map(|t| NO_SIDE_EFFECT_CTORS.contains(&t))
                .unwrap_or(false);
            callee_whitelisted
                && tree
                    .descendants(node)
                    .filter(|&d| {
                        tree.is_leaf(d)
                            && tree
                                .ancestors(d)
                                .any(|a| tree.kind(a) == SyntaxKind::ValueArgList)
                    })
                    .all(|d| {
                        matches!(
                            tree.kind(d),
                            SyntaxKind::Literal | SyntaxKind::Punct | SyntaxKind::Whitespace
                        )
                    })
        }
        _ => false,
    }
}

/// First reference to `name` in the given statements, with its containing
/// top-level statement. Member accesses on a receiver and references
/// shadowed by a nested same-named declaration do not count.
fn first_use(
    tree: &SyntaxTree,
    statements: &[NodeId],
    name: &str,
) -> Option<(NodeId, NodeId)> {
    for &stmt in statements {
        for id in tree.descendants(stmt) {
            if tree.kind(id) != SyntaxKind::Identifier || tree.leaf_text(id) != Some(name) {
                continue;
            }
            if tree.parent(id).map(|p| tree.kind(p)) == Some(SyntaxKind::DotExpr) {
                continue;
            }
            if is_declaration_name(tree, id) {
                continue;
            }
            if is_shadowed(tree, stmt, id, name) {
                continue;
            }
            return Some((stmt, id));
        }
    }
    None
}

/// True when the identifier is the declared name of a property
fn is_declaration_name(tree: &SyntaxTree, id: NodeId) -> bool {
    let Some(parent) = tree.parent(id) else {
        return false;
    };
    tree.kind(parent) == SyntaxKind::PropertyDecl
        && tree
            .children(parent)
            .iter()
            .copied()
            .find(|&c| tree.kind(c) == SyntaxKind::Identifier)
            == Some(id)
}

/// True when a same-named declaration in a nested scope sits between the
/// statement start and the reference
fn is_shadowed(tree: &SyntaxTree, stmt: NodeId, ident: NodeId, name: &str) -> bool {
    tree.descendants(stmt).any(|d| {
        tree.kind(d) == SyntaxKind::PropertyDecl
            && property_name(tree, d).as_deref() == Some(name)
            && tree.offset(d) < tree.offset(ident)
            && tree
                .ancestor_of_kind(d, SyntaxKind::Block)
                .map(|block| tree.ancestors(ident).any(|a| a == block))
                .unwrap_or(false)
    })
}
