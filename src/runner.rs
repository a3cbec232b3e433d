//! Batch runner
//!
//! Processes a file collection in check or fix mode: read, parse, run the
//! engine, filter against the baseline, fan the survivors out to the
//! reporters, and in fix mode write the rewritten content back when it
//! differs from the original. Per-file processing is independent; the
//! diagnostic counter and the reporters are the only shared mutable state,
//! so files may be processed in parallel.
//!
//! A file the parser rejects is skipped and reported as one synthetic
//! diagnostic; it never aborts the batch. Reads and writes are retried a
//! bounded number of times with backoff before counting as a per-file
//! failure.

use crate::baseline::{Baseline, BaselineError};
use crate::config::{ConfigError, LintConfig};
use crate::diagnostic::{Diagnostic, RunResult};
use crate::engine::LintEngine;
use crate::parser;
use crate::reporter::{FanOut, Reporter};
use crate::rules;
use crate::warnings::PARSE_ERROR_ID;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

const IO_ATTEMPTS: usize = 3;
const IO_RETRY_BASE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Execution options for one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Process files on a worker pool
    pub parallel: bool,
    /// Worker count; defaults to the number of logical CPUs
    pub jobs: Option<usize>,
}

/// Drives check and fix runs over a file collection
pub struct Runner {
    engine: LintEngine,
    baseline_path: Option<PathBuf>,
    options: RunOptions,
}

struct RunState<'a> {
    reporter: Mutex<FanOut>,
    counter: AtomicUsize,
    baseline: Option<Baseline>,
    /// Present in baseline-generation mode; findings are recorded here
    /// instead of being reported
    generated: Option<Mutex<Baseline>>,
    fix_mode: bool,
    on_updated: &'a (dyn Fn(&Path) + Sync),
}

impl Runner {
    /// Validate the configuration and register the default check set
    pub fn new(config: LintConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = LintEngine::new(config);
        for check in rules::default_checks() {
            engine.register_check(check);
        }
        Ok(Self {
            engine,
            baseline_path: None,
            options: RunOptions::default(),
        })
    }

    pub fn with_baseline(mut self, path: PathBuf) -> Self {
        self.baseline_path = Some(path);
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Report violations without touching any file. Returns the number of
    /// non-suppressed diagnostics.
    pub fn check(
        &self,
        files: &[PathBuf],
        reporters: Vec<Box<dyn Reporter>>,
    ) -> Result<usize, RunnerError> {
        self.run(files, reporters, false, &|_| {})
    }

    /// Apply automatic fixes, rewriting files whose content changed.
    /// `on_file_updated` fires once per rewritten file. Returns the number
    /// of non-suppressed diagnostics, corrected ones included.
    pub fn fix(
        &self,
        files: &[PathBuf],
        reporters: Vec<Box<dyn Reporter>>,
        on_file_updated: &(dyn Fn(&Path) + Sync),
    ) -> Result<usize, RunnerError> {
        self.run(files, reporters, true, on_file_updated)
    }

    fn run(
        &self,
        files: &[PathBuf],
        reporters: Vec<Box<dyn Reporter>>,
        fix_mode: bool,
        on_updated: &(dyn Fn(&Path) + Sync),
    ) -> Result<usize, RunnerError> {
        // A requested but missing baseline switches the run to generation
        // mode: record findings instead of reporting them.
        let mut baseline = None;
        let mut generated = None;
        if let Some(path) = &self.baseline_path {
            if path.exists() {
                baseline = Some(Baseline::load(path)?);
            } else {
                info!(
                    "baseline {} not found, recording findings into it",
                    path.display()
                );
                generated = Some(Mutex::new(Baseline::new()));
            }
        }

        let state = RunState {
            reporter: Mutex::new(FanOut::new(reporters)),
            counter: AtomicUsize::new(0),
            baseline,
            generated,
            fix_mode,
            on_updated,
        };

        if state.generated.is_none() {
            self.locked_reporter(&state).before_all(files);
        }

        if self.options.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs.unwrap_or_else(num_cpus::get))
                .build()?;
            pool.install(|| {
                files.par_iter().for_each(|file| self.process(file, &state));
            });
        } else {
            for file in files {
                self.process(file, &state);
            }
        }

        if let Some(generated) = &state.generated {
            let baseline = generated.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(path) = &self.baseline_path {
                baseline.save(path)?;
                info!(
                    "recorded {} finding(s) into baseline {}",
                    baseline.len(),
                    path.display()
                );
            }
        } else {
            self.locked_reporter(&state).after_all();
        }

        Ok(state.counter.load(Ordering::SeqCst))
    }

    fn locked_reporter<'s>(&self, state: &'s RunState) -> std::sync::MutexGuard<'s, FanOut> {
        state.reporter.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn process(&self, file: &Path, state: &RunState) {
        let original = match with_retry(|| std::fs::read_to_string(file), "reading", file) {
            Ok(text) => text,
            Err(e) => {
                error!("{}: could not be read: {}", file.display(), e);
                let diag = Diagnostic::new(
                    file.to_path_buf(),
                    1,
                    1,
                    PARSE_ERROR_ID,
                    &format!("file could not be read: {}", e),
                );
                self.emit(
                    file,
                    RunResult {
                        diagnostics: vec![diag],
                        ..RunResult::default()
                    },
                    state,
                );
                return;
            }
        };

        let is_script = file.extension().and_then(|e| e.to_str()) == Some("kts");
        let mut tree = match parser::parse(&original, is_script) {
            Ok(tree) => tree,
            Err(e) => {
                debug!("{}: skipped, {}", file.display(), e);
                let diag = Diagnostic::new(
                    file.to_path_buf(),
                    e.line,
                    1,
                    PARSE_ERROR_ID,
                    &e.to_string(),
                );
                self.emit(
                    file,
                    RunResult {
                        diagnostics: vec![diag],
                        ..RunResult::default()
                    },
                    state,
                );
                return;
            }
        };

        let output = self.engine.run(&mut tree, file, state.fix_mode);
        let mut result = RunResult {
            diagnostics: output.diagnostics,
            ..RunResult::default()
        };

        if state.fix_mode {
            let rewritten = tree.text();
            if rewritten != original {
                result.content_changed = true;
                match with_retry(|| std::fs::write(file, &rewritten), "writing", file) {
                    Ok(()) => (state.on_updated)(file),
                    Err(e) => error!("{}: could not be written: {}", file.display(), e),
                }
            }
        }

        self.emit(file, result, state);
    }

    fn emit(&self, file: &Path, mut result: RunResult, state: &RunState) {
        if let Some(generated) = &state.generated {
            let mut baseline = generated.lock().unwrap_or_else(|e| e.into_inner());
            for diag in &result.diagnostics {
                baseline.record(file, diag);
            }
            return;
        }

        if let Some(baseline) = &state.baseline {
            let before = result.diagnostics.len();
            result
                .diagnostics
                .retain(|d| !baseline.contains(file, &d.key()));
            result.suppressed_count = before - result.diagnostics.len();
            if result.suppressed_count > 0 {
                debug!(
                    "{}: {} finding(s) suppressed by baseline",
                    file.display(),
                    result.suppressed_count
                );
            }
        }

        state
            .counter
            .fetch_add(result.surviving_count(), Ordering::SeqCst);

        let mut reporter = self.locked_reporter(state);
        reporter.before(file);
        for diag in &result.diagnostics {
            let was_corrected = state.fix_mode && diag.can_be_auto_corrected;
            reporter.on_diagnostic(file, diag, was_corrected);
        }
        reporter.after(file);
    }
}

/// Run an I/O operation with bounded retry and exponential backoff
fn with_retry<T>(
    mut op: impl FnMut() -> std::io::Result<T>,
    what: &str,
    path: &Path,
) -> std::io::Result<T> {
    let mut delay = IO_RETRY_BASE;
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= IO_ATTEMPTS => return Err(e),
            Err(e) => {
                warn!(
                    "{} {} failed (attempt {}): {}, retrying",
                    what,
                    path.display(),
                    attempt,
                    e
                );
                std::thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfigEntry;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    struct Collecting {
        findings: Arc<Mutex<Vec<(PathBuf, String, bool)>>>,
    }

    impl Reporter for Collecting {
        fn on_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic, was_corrected: bool) {
            self.findings.lock().unwrap().push((
                file.to_path_buf(),
                diagnostic.warning_id.clone(),
                was_corrected,
            ));
        }
    }

    fn collector() -> (Arc<Mutex<Vec<(PathBuf, String, bool)>>>, Vec<Box<dyn Reporter>>) {
        let findings = Arc::new(Mutex::new(Vec::new()));
        let reporter = Collecting {
            findings: findings.clone(),
        };
        (findings, vec![Box::new(reporter)])
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_check_counts_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "class Foo {\n  fun bar() {\n  }\n}\n");

        let runner = Runner::new(LintConfig::new()).unwrap();
        let (findings, reporters) = collector();
        let count = runner.check(&[file.clone()], reporters).unwrap();

        assert!(count > 0);
        let findings = findings.lock().unwrap();
        assert_eq!(findings.len(), count);
        assert!(findings.iter().all(|(f, id, corrected)| {
            f == &file && id == "wrong-indentation" && !corrected
        }));
    }

    #[test]
    fn test_clean_file_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "class Foo {\n    fun bar() {\n    }\n}\n");

        let runner = Runner::new(LintConfig::new()).unwrap();
        let (_, reporters) = collector();
        assert_eq!(runner.check(&[file], reporters).unwrap(), 0);
    }

    #[test]
    fn test_parse_failure_is_one_synthetic_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write_file(&dir, "broken.kt", "fun f() {\n");
        let clean = write_file(&dir, "clean.kt", "fun f() {\n}\n");

        let runner = Runner::new(LintConfig::new()).unwrap();
        let (findings, reporters) = collector();
        let count = runner.check(&[broken.clone(), clean], reporters).unwrap();

        assert_eq!(count, 1);
        let findings = findings.lock().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].0, broken);
        assert_eq!(findings[0].1, PARSE_ERROR_ID);
    }

    #[test]
    fn test_baseline_generation_then_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "class Foo {\n  fun bar() {\n  }\n}\n");
        let baseline = dir.path().join("baseline.json");

        let runner = Runner::new(LintConfig::new())
            .unwrap()
            .with_baseline(baseline.clone());

        // First run records instead of reporting.
        let (findings, reporters) = collector();
        assert_eq!(runner.check(&[file.clone()], reporters).unwrap(), 0);
        assert!(findings.lock().unwrap().is_empty());
        assert!(baseline.exists());

        // Unchanged file against the fresh baseline: nothing surfaces.
        let (findings, reporters) = collector();
        assert_eq!(runner.check(&[file], reporters).unwrap(), 0);
        assert!(findings.lock().unwrap().is_empty());
    }

    #[test]
    fn test_new_diagnostic_surfaces_past_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "class Foo {\n  fun bar() {\n  }\n}\n");
        let baseline = dir.path().join("baseline.json");

        let runner = Runner::new(LintConfig::new())
            .unwrap()
            .with_baseline(baseline.clone());
        let (_, reporters) = collector();
        runner.check(&[file.clone()], reporters).unwrap();

        // A new violation is not in the baseline; the old ones still are.
        std::fs::write(&file, "class Foo {\n  fun bar() {\n  }\n}   \n").unwrap();
        let (findings, reporters) = collector();
        let count = runner.check(&[file], reporters).unwrap();
        assert_eq!(count, 1);
        let findings = findings.lock().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].1, "trailing-whitespace");
    }

    #[test]
    fn test_fix_mode_end_to_end_with_disabled_warning() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "fun f() {\n  val x = 1  \n}\n");

        let config =
            LintConfig::new().with_entry(RuleConfigEntry::disabled("trailing-whitespace"));
        let runner = Runner::new(config).unwrap();
        let updated = AtomicBool::new(false);

        let (findings, reporters) = collector();
        let count = runner
            .fix(&[file.clone()], reporters, &|_| {
                updated.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(count, 1);
        assert!(updated.load(Ordering::SeqCst));
        let findings = findings.lock().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].1, "wrong-indentation");
        assert!(findings[0].2);

        // Indentation corrected, disabled warning untouched.
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "fun f() {\n    val x = 1  \n}\n");
    }

    #[test]
    fn test_fix_mode_skips_write_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "a.kt", "fun f() {\n}\n");

        let runner = Runner::new(LintConfig::new()).unwrap();
        let updated = AtomicBool::new(false);
        let (_, reporters) = collector();
        let count = runner
            .fix(&[file], reporters, &|_| {
                updated.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(count, 0);
        assert!(!updated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_parallel_run_matches_sequential_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..4 {
            files.push(write_file(
                &dir,
                &format!("f{}.kt", i),
                "class Foo {\n  fun bar() {\n  }\n}\n",
            ));
        }

        let sequential = Runner::new(LintConfig::new()).unwrap();
        let (_, reporters) = collector();
        let expected = sequential.check(&files, reporters).unwrap();

        let parallel = Runner::new(LintConfig::new()).unwrap().with_options(RunOptions {
            parallel: true,
            jobs: Some(2),
        });
        let (_, reporters) = collector();
        assert_eq!(parallel.check(&files, reporters).unwrap(), expected);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = LintConfig::new().with_entry(RuleConfigEntry::new("no-such-warning"));
        assert!(Runner::new(config).is_err());
    }
}
