//! Dekor - style linter and auto-fixer for Kotlin-style sources
//!
//! Inspects parsed source files, reports style violations according to a
//! user-supplied configuration, and optionally rewrites files in place to
//! resolve the auto-fixable subset.
//!
//! # Architecture
//!
//! ```text
//! CLI -> Runner -> parse -> LintEngine -> checks -> diagnostics
//!                                      \-> fixes (fix mode)
//!        Runner -> baseline filter -> reporters
//! ```
//!
//! The engine performs one pre-order traversal per file; each check declares
//! the node kinds it wants to see and is dispatched through a kind-to-checks
//! table. Fixes are tree mutations applied during the same traversal, with
//! an attachment guard against conflicting earlier fixes. The runner filters
//! known findings through an optional baseline and fans the survivors out to
//! the configured reporters.

pub mod baseline;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod parser;
pub mod reporter;
pub mod rules;
pub mod runner;
pub mod tree;
pub mod warnings;

// Re-export main types
pub use baseline::Baseline;
pub use config::{ConfigError, LintConfig, RuleConfigEntry};
pub use diagnostic::{Diagnostic, DiagnosticKey, RunResult};
pub use engine::{Check, CheckFailure, LintEngine, TraversalContext};
pub use parser::{parse, parses_cleanly, ParseError};
pub use reporter::{FanOut, JsonReporter, PlainReporter, Reporter};
pub use runner::{RunOptions, Runner, RunnerError};
pub use tree::{NodeId, SyntaxKind, SyntaxTree};
pub use warnings::{RuleGroup, Warning};
