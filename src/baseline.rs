//! Baseline suppression
//!
//! A baseline records the known findings of a codebase so a lint gate can be
//! introduced without fixing historical violations first. It maps file paths
//! to sets of `(line, column, warning id)` keys; a diagnostic matching a
//! recorded key is suppressed and does not count toward the failure total.
//! New findings are unaffected.
//!
//! The file is JSON and round-trips keys losslessly.

use crate::diagnostic::{Diagnostic, DiagnosticKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("baseline parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Known findings, keyed by file path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Baseline {
    files: BTreeMap<PathBuf, BTreeSet<DiagnosticKey>>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, BaselineError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), BaselineError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// True when the diagnostic was recorded for this file
    pub fn contains(&self, file: &Path, key: &DiagnosticKey) -> bool {
        self.files
            .get(file)
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    pub fn record(&mut self, file: &Path, diagnostic: &Diagnostic) {
        self.files
            .entry(file.to_path_buf())
            .or_default()
            .insert(diagnostic.key());
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total number of recorded keys across all files
    pub fn len(&self) -> usize {
        self.files.values().map(|keys| keys.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn diag(line: usize, column: usize, id: &str) -> Diagnostic {
        Diagnostic::new(PathBuf::from("src/a.kt"), line, column, id, "msg")
    }

    #[test]
    fn test_contains_recorded_key() {
        let mut baseline = Baseline::new();
        baseline.record(Path::new("src/a.kt"), &diag(3, 1, "wrong-indentation"));

        assert!(baseline.contains(Path::new("src/a.kt"), &diag(3, 1, "wrong-indentation").key()));
        assert!(!baseline.contains(Path::new("src/a.kt"), &diag(4, 1, "wrong-indentation").key()));
        assert!(!baseline.contains(Path::new("src/b.kt"), &diag(3, 1, "wrong-indentation").key()));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");

        let mut baseline = Baseline::new();
        baseline.record(Path::new("src/a.kt"), &diag(3, 1, "wrong-indentation"));
        baseline.record(Path::new("src/a.kt"), &diag(7, 5, "commented-out-code"));
        baseline.record(Path::new("src/b.kt"), &diag(1, 1, "trailing-whitespace"));
        baseline.save(&path).unwrap();

        let loaded = Baseline::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.contains(Path::new("src/a.kt"), &diag(7, 5, "commented-out-code").key()));
        assert!(loaded.contains(Path::new("src/b.kt"), &diag(1, 1, "trailing-whitespace").key()));
    }

    #[test]
    fn test_duplicate_record_is_one_key() {
        let mut baseline = Baseline::new();
        baseline.record(Path::new("a.kt"), &diag(3, 1, "w1"));
        baseline.record(Path::new("a.kt"), &diag(3, 1, "w1"));
        assert_eq!(baseline.len(), 1);
    }
}
