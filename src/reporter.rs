//! Result reporting
//!
//! Reporters receive lifecycle callbacks around a run: one `before_all` /
//! `after_all` bracket, `before` / `after` per file, and `on_diagnostic` for
//! every surviving finding. Multiple reporters compose with [`FanOut`],
//! which forwards every event in registration order.

use crate::diagnostic::Diagnostic;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Receiver of run events. All methods default to no-ops except
/// `on_diagnostic`.
pub trait Reporter: Send {
    fn before_all(&mut self, _files: &[PathBuf]) {}

    fn before(&mut self, _file: &Path) {}

    fn on_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic, was_corrected: bool);

    fn after(&mut self, _file: &Path) {}

    fn after_all(&mut self) {}
}

/// Forwards every event to each registered reporter, in order
pub struct FanOut {
    reporters: Vec<Box<dyn Reporter>>,
}

impl FanOut {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for FanOut {
    fn before_all(&mut self, files: &[PathBuf]) {
        for r in &mut self.reporters {
            r.before_all(files);
        }
    }

    fn before(&mut self, file: &Path) {
        for r in &mut self.reporters {
            r.before(file);
        }
    }

    fn on_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic, was_corrected: bool) {
        for r in &mut self.reporters {
            r.on_diagnostic(file, diagnostic, was_corrected);
        }
    }

    fn after(&mut self, file: &Path) {
        for r in &mut self.reporters {
            r.after(file);
        }
    }

    fn after_all(&mut self) {
        for r in &mut self.reporters {
            r.after_all();
        }
    }
}

/// Human-readable output, one line per finding plus a final summary
#[derive(Default)]
pub struct PlainReporter {
    finding_count: usize,
    corrected_count: usize,
}

impl PlainReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_line(file: &Path, diagnostic: &Diagnostic, was_corrected: bool) -> String {
        let location = format!(
            "{}:{}:{}",
            file.display(),
            diagnostic.line,
            diagnostic.column
        );
        let mut line = format!(
            "{} {} {}",
            location.cyan(),
            format!("[{}]", diagnostic.warning_id).yellow(),
            diagnostic.message
        );
        if was_corrected {
            line.push(' ');
            line.push_str(&"[fixed]".green().to_string());
        }
        line
    }
}

impl Reporter for PlainReporter {
    fn on_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic, was_corrected: bool) {
        self.finding_count += 1;
        if was_corrected {
            self.corrected_count += 1;
        }
        println!("{}", Self::format_line(file, diagnostic, was_corrected));
    }

    fn after_all(&mut self) {
        if self.finding_count == 0 {
            println!("{}", "no findings".green());
        } else {
            println!(
                "{} finding(s), {} auto-corrected",
                self.finding_count, self.corrected_count
            );
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonFinding {
    file: PathBuf,
    line: usize,
    column: usize,
    id: String,
    message: String,
    corrected: bool,
}

/// Machine-readable output: one JSON array, printed at the end of the run
#[derive(Default)]
pub struct JsonReporter {
    findings: Vec<JsonFinding>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self) -> String {
        serde_json::to_string_pretty(&self.findings).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Reporter for JsonReporter {
    fn on_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic, was_corrected: bool) {
        self.findings.push(JsonFinding {
            file: file.to_path_buf(),
            line: diagnostic.line,
            column: diagnostic.column,
            id: diagnostic.warning_id.clone(),
            message: diagnostic.message.clone(),
            corrected: was_corrected,
        });
    }

    fn after_all(&mut self) {
        println!("{}", self.render());
    }
}
