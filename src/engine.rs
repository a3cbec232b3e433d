//! Rule execution engine
//!
//! One pre-order traversal serves every registered check. Each check declares
//! the node kinds it is interested in; a kind-to-checks table is built once
//! per run so dispatch needs no runtime type inspection. Checks receive an
//! explicit [`TraversalContext`] instead of ambient state.
//!
//! In fix mode a check may hand back a mutation closure together with the
//! diagnostic. The engine applies it right after the check returns for that
//! node, but only if the node is still attached to the tree; an earlier check
//! in the same pass may already have restructured the subtree, in which case
//! the mutation is skipped and the diagnostic is reported as not corrected.
//!
//! Ordering guarantee: diagnostics within one file come out in node-visit
//! order; multiple checks firing on the same node report in registration
//! order.

use crate::config::LintConfig;
use crate::diagnostic::Diagnostic;
use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::warnings::Warning;
use log::{debug, error};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A mutation a check requests alongside a diagnostic
pub type FixFn = Box<dyn FnOnce(&mut SyntaxTree)>;

/// Failure raised by a check while visiting a node
#[derive(Debug, Error)]
#[error("check '{check_id}' failed: {message}")]
pub struct CheckFailure {
    pub check_id: &'static str,
    pub message: String,
}

impl CheckFailure {
    pub fn new(check_id: &'static str, message: impl Into<String>) -> Self {
        Self {
            check_id,
            message: message.into(),
        }
    }
}

/// A unit of lint logic. Its interest declaration plus `visit` is its entire
/// public surface.
pub trait Check: Send + Sync {
    /// Warning id this check owns; used for configuration enablement
    fn id(&self) -> &'static str;

    /// Node kinds the check wants to see
    fn interests(&self) -> &'static [SyntaxKind];

    /// Called for every visited node whose kind is in `interests`
    fn visit(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        ctx: &mut TraversalContext,
    ) -> Result<(), CheckFailure>;
}

struct Pending {
    node: NodeId,
    warning: &'static Warning,
    message: String,
    fix: Option<FixFn>,
    /// Explicit position; defaults to the node's own position
    position: Option<(usize, usize)>,
}

/// Per-run state handed to every check invocation: configuration, fix-mode
/// flag, and the diagnostic sink. No global mutable state.
pub struct TraversalContext<'a> {
    config: &'a LintConfig,
    fix_mode: bool,
    file: &'a Path,
    pending: Vec<Pending>,
}

impl<'a> TraversalContext<'a> {
    pub fn config(&self) -> &LintConfig {
        self.config
    }

    pub fn fix_mode(&self) -> bool {
        self.fix_mode
    }

    pub fn file(&self) -> &Path {
        self.file
    }

    /// Report a violation at `node`. The optional mutation closure is applied
    /// by the engine after the check returns control for this node.
    pub fn report(
        &mut self,
        node: NodeId,
        warning: &'static Warning,
        message: String,
        fix: Option<FixFn>,
    ) {
        self.pending.push(Pending {
            node,
            warning,
            message,
            fix,
            position: None,
        });
    }

    /// Like [`report`](Self::report) but with an explicit position. Used when
    /// the violation sits inside a multi-line leaf (e.g. one line of a
    /// documentation block) and the node's own position would be off.
    pub fn report_at(
        &mut self,
        node: NodeId,
        line: usize,
        column: usize,
        warning: &'static Warning,
        message: String,
        fix: Option<FixFn>,
    ) {
        self.pending.push(Pending {
            node,
            warning,
            message,
            fix,
            position: Some((line, column)),
        });
    }
}

/// Outcome of running the engine over one file's tree
#[derive(Default)]
pub struct EngineOutput {
    /// Diagnostics in emission order
    pub diagnostics: Vec<Diagnostic>,
    /// Set when a check failed; diagnostics collected so far are still valid
    pub failure: Option<CheckFailure>,
}

/// The rule execution engine
pub struct LintEngine {
    config: LintConfig,
    checks: Vec<Box<dyn Check>>,
}

impl LintEngine {
    pub fn new(config: LintConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
        }
    }

    /// Register a check; registration order is the same-node report order
    pub fn register_check(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    /// Run every enabled check over the tree. In fix mode the tree may be
    /// mutated; the caller decides what to do with the rewritten text.
    pub fn run(&self, tree: &mut SyntaxTree, file: &Path, fix_mode: bool) -> EngineOutput {
        let mut output = EngineOutput::default();

        // Kind -> check indices, built once per run, registration order kept.
        let mut dispatch: HashMap<SyntaxKind, Vec<usize>> = HashMap::new();
        for (i, check) in self.checks.iter().enumerate() {
            if !self.config.is_enabled(check.id()) {
                continue;
            }
            for &kind in check.interests() {
                dispatch.entry(kind).or_default().push(i);
            }
        }

        let mut ctx = TraversalContext {
            config: &self.config,
            fix_mode,
            file,
            pending: Vec::new(),
        };

        // Cursor traversal: (parent, next child index). Child lists are
        // re-read on every step so a replaced subtree cannot dangle.
        let root = tree.root();
        if !self.visit_node(tree, root, &dispatch, &mut ctx, &mut output) {
            return output;
        }
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(&(parent, index)) = stack.last() {
            let children = tree.children(parent);
            if index >= children.len() {
                stack.pop();
                continue;
            }
            let child = children[index];
            stack.last_mut().expect("stack is non-empty").1 += 1;

            if !self.visit_node(tree, child, &dispatch, &mut ctx, &mut output) {
                return output;
            }
            stack.push((child, 0));
        }

        output
    }

    /// Returns false when a check failed and traversal must stop
    fn visit_node(
        &self,
        tree: &mut SyntaxTree,
        node: NodeId,
        dispatch: &HashMap<SyntaxKind, Vec<usize>>,
        ctx: &mut TraversalContext,
        output: &mut EngineOutput,
    ) -> bool {
        let kind = tree.kind(node);
        let Some(check_indices) = dispatch.get(&kind) else {
            return true;
        };

        for &i in check_indices {
            let check = &self.checks[i];
            let result = check.visit(tree, node, ctx);

            // Apply this check's reports (and fixes) before the next check
            // sees the node.
            let pending = std::mem::take(&mut ctx.pending);
            for p in pending {
                self.resolve_pending(tree, ctx.file, ctx.fix_mode, p, output);
            }

            if let Err(failure) = result {
                error!(
                    "{}: check '{}' failed at {} node (offset {}): {}",
                    ctx.file.display(),
                    failure.check_id,
                    kind,
                    tree.offset(node),
                    failure.message
                );
                output.failure = Some(failure);
                return false;
            }
        }
        true
    }

    fn resolve_pending(
        &self,
        tree: &mut SyntaxTree,
        file: &Path,
        fix_mode: bool,
        pending: Pending,
        output: &mut EngineOutput,
    ) {
        let (line, column) = pending
            .position
            .unwrap_or_else(|| tree.line_col(pending.node));
        let mut corrected = pending.warning.auto_fixable;

        if fix_mode {
            corrected = false;
            if let Some(fix) = pending.fix {
                // Idempotent mutation guard: an earlier check may have
                // replaced this subtree already.
                if tree.is_attached(pending.node) {
                    fix(tree);
                    corrected = true;
                } else {
                    debug!(
                        "{}: skipping fix for '{}' at {}:{}, node no longer attached",
                        file.display(),
                        pending.warning.id,
                        line,
                        column
                    );
                }
            }
        }

        output.diagnostics.push(
            Diagnostic::new(
                PathBuf::from(file),
                line,
                column,
                pending.warning.id,
                &pending.message,
            )
            .auto_corrected(corrected),
        );
    }
}
