//! Dekor CLI
//!
//! Lints Kotlin-style source files and optionally fixes them in place.

use clap::{Parser, ValueEnum};
use colored::Colorize;
use dekor::reporter::{JsonReporter, PlainReporter, Reporter};
use dekor::runner::{RunOptions, Runner};
use dekor::{warnings, LintConfig};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "dekor",
    version,
    about = "Style linter and auto-fixer for Kotlin-style sources"
)]
struct Cli {
    /// Files or directories to process (directories are scanned recursively)
    paths: Vec<PathBuf>,

    /// Configuration file path (defaults to .dekor.yaml in cwd or home)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Apply automatic fixes, rewriting files in place
    #[arg(long)]
    fix: bool,

    /// Baseline file to suppress known findings (created if not found)
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Exclude paths matching these glob patterns (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Number of parallel jobs (0 = auto, 1 = sequential)
    #[arg(short, long, default_value = "0")]
    jobs: usize,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List the warning catalog and exit
    #[arg(long)]
    list_warnings: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if cli.list_warnings {
        for warning in warnings::CATALOG {
            let fixable = if warning.auto_fixable { " [fixable]" } else { "" };
            println!(
                "  {} ({}){}",
                warning.id.cyan(),
                warning.group,
                fixable.green()
            );
        }
        return;
    }

    let config = match &cli.config {
        Some(path) => LintConfig::load(path),
        None => LintConfig::load_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "configuration error:".red(), e);
            std::process::exit(2);
        }
    };

    let exclude = match build_exclude_set(&cli.exclude) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("{} {}", "invalid exclude pattern:".red(), e);
            std::process::exit(2);
        }
    };

    let files = collect_files(&cli.paths, &exclude);
    if files.is_empty() {
        eprintln!("no input files");
        std::process::exit(1);
    }

    let runner = match Runner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{} {}", "configuration error:".red(), e);
            std::process::exit(2);
        }
    };
    let mut runner = runner.with_options(RunOptions {
        parallel: cli.jobs != 1,
        jobs: if cli.jobs == 0 { None } else { Some(cli.jobs) },
    });
    if let Some(baseline) = cli.baseline.clone() {
        runner = runner.with_baseline(baseline);
    }

    let reporters: Vec<Box<dyn Reporter>> = match cli.format {
        Format::Text => vec![Box::new(PlainReporter::new())],
        Format::Json => vec![Box::new(JsonReporter::new())],
    };

    let result = if cli.fix {
        runner.fix(&files, reporters, &|file| {
            log::info!("updated {}", file.display());
        })
    } else {
        runner.check(&files, reporters)
    };

    match result {
        Ok(count) => {
            if !cli.fix && count > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red(), e);
            std::process::exit(2);
        }
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn collect_files(paths: &[PathBuf], exclude: &GlobSet) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        collect_into(path, exclude, true, &mut files);
    }
    files.sort();
    files.dedup();
    files
}

fn collect_into(path: &Path, exclude: &GlobSet, explicit: bool, out: &mut Vec<PathBuf>) {
    if exclude.is_match(path) {
        return;
    }
    if path.is_dir() {
        match std::fs::read_dir(path) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    collect_into(&entry.path(), exclude, false, out);
                }
            }
            Err(e) => log::error!("could not scan {}: {}", path.display(), e),
        }
    } else if explicit || is_source_file(path) {
        out.push(path.to_path_buf());
    }
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("kt") | Some("kts")
    )
}
