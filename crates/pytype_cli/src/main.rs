//! Command-line front end: `pytype <file>` parses and type-checks a single Python module and
//! prints every diagnostic found, exiting non-zero iff at least one was reported.
//!
//! Grounded in `crates/ty`'s CLI shape (clap-derived args, `tracing-subscriber` for `-v`,
//! `colored` for terminal rendering) scaled down to this checker's single-file, no-project-
//! discovery scope (§6: there is no workspace/config-file resolution to do).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use ruff_source_file::LineIndex;
use tracing_subscriber::EnvFilter;

use pytype_checker::diagnostics::Diagnostic;
use pytype_checker::resolver::FsModuleResolver;
use pytype_checker::cache::NullCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Parser)]
#[command(name = "pytype", about = "Static type checker for a dynamically-typed scripting language")]
struct Args {
    /// Path to the module to check.
    file: PathBuf,

    /// Controls whether diagnostics are rendered with ANSI color.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Increases log verbosity; repeat for more detail (-v, -vv).
    #[arg(short, long, action = clap::builder::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        // A clean run always exits 0, whether or not diagnostics were found: diagnostics are
        // findings about the checked module, not a failure of the checker itself.
        Ok(_found_diagnostics) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err:?}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Returns `true` iff any diagnostic was reported.
fn run(args: &Args) -> Result<bool> {
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file.display()))?;

    let resolver = FsModuleResolver::for_file(&args.file);
    let cache = NullCache;
    let result = pytype_checker::check_source_with(&args.file, &source, &resolver, &cache)
        .with_context(|| format!("failed to check '{}'", args.file.display()))?;

    let use_color = match args.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
    };
    colored::control::set_override(use_color);

    let line_index = LineIndex::from_source_text(&source);
    let mut diagnostics = result.diagnostics.clone();
    diagnostics.sort_by_key(|d| d.range.start());

    for diagnostic in &diagnostics {
        print_diagnostic(diagnostic, &args.file, &source, &line_index);
    }

    if args.verbose > 0 {
        for annotation in &result.annotations {
            println!(
                "{}: {} : {:?}",
                "annotation".blue(),
                annotation.name,
                annotation.declared_type
            );
        }
    }

    Ok(!diagnostics.is_empty())
}

fn print_diagnostic(diagnostic: &Diagnostic, path: &std::path::Path, source: &str, line_index: &LineIndex) {
    let location = line_index.source_location(diagnostic.range.start(), source);
    println!(
        "{}:{}:{}: {} {}",
        path.display(),
        location.row,
        location.column,
        format!("[{}]", diagnostic.category.code()).yellow(),
        diagnostic.message
    );
}
