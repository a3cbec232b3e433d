//! Diagnostic types for lint results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One reported occurrence of a warning at a specific location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// File the diagnostic was produced for
    pub file: PathBuf,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Warning id from the catalog
    pub warning_id: String,
    /// Rendered message
    pub message: String,
    /// Whether the fix was (or could have been) applied automatically
    pub can_be_auto_corrected: bool,
}

impl Diagnostic {
    pub fn new(
        file: PathBuf,
        line: usize,
        column: usize,
        warning_id: &str,
        message: &str,
    ) -> Self {
        Self {
            file,
            line,
            column,
            warning_id: warning_id.to_string(),
            message: message.to_string(),
            can_be_auto_corrected: false,
        }
    }

    pub fn auto_corrected(mut self, corrected: bool) -> Self {
        self.can_be_auto_corrected = corrected;
        self
    }

    /// Baseline matching key
    pub fn key(&self) -> DiagnosticKey {
        DiagnosticKey {
            line: self.line,
            column: self.column,
            warning_id: self.warning_id.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: [{}] {}",
            self.file.display(),
            self.line,
            self.column,
            self.warning_id,
            self.message
        )
    }
}

/// Equality key used for baseline suppression: `(line, column, warning id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagnosticKey {
    pub line: usize,
    pub column: usize,
    #[serde(rename = "id")]
    pub warning_id: String,
}

/// Per-file outcome of one engine run
#[derive(Debug, Default)]
pub struct RunResult {
    /// Diagnostics in emission order (document order within the file)
    pub diagnostics: Vec<Diagnostic>,
    /// Fix mode only: whether the rewritten content differs from the input
    pub content_changed: bool,
    /// Diagnostics removed by baseline suppression
    pub suppressed_count: usize,
}

impl RunResult {
    /// Count of surviving (non-suppressed) diagnostics
    pub fn surviving_count(&self) -> usize {
        self.diagnostics.len()
    }
}
