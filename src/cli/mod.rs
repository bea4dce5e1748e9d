//! The mockshift command-line interface.
//!
//! Dispatches subcommands to the file driver. Files are processed one after
//! another; a file that cannot be read or parsed is reported and skipped,
//! and makes the process exit with status 1 once the others are done.

use std::{fs, path::PathBuf, process};

use clap::Parser;
use termcolor::{ColorChoice, StandardStream};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    discovery::discover_sources,
    engine::{Engine, SourceFile},
    errors::print_error,
    MockshiftError,
};

use args::{Command, MockshiftArgs};
use output::{FileReport, Failure, RewriteReport};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = MockshiftArgs::parse();
    init_tracing(args.verbose);

    match dispatch(args) {
        Ok(status) => process::exit(status),
        Err(e) => {
            print_error(e);
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "mockshift=debug" } else { "mockshift=warn" };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn dispatch(args: MockshiftArgs) -> Result<i32, MockshiftError> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(args.config.as_deref(), &cwd)?;
    let engine = Engine::new(config);
    match args.command {
        Command::Rewrite { paths, write, json } => handle_rewrite(&engine, &paths, write, json),
        Command::Scan { paths, json } => handle_scan(&engine, &paths, json),
    }
}

/// Reads and parses every discovered file, setting failures aside.
fn load(engine: &Engine, paths: &[PathBuf]) -> Result<(Vec<SourceFile>, Vec<(PathBuf, MockshiftError)>), MockshiftError> {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for path in discover_sources(paths, &engine.config().extensions())? {
        match engine.read(&path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(path = %path.display(), "skipping file: {}", e);
                failures.push((path, e));
            }
        }
    }
    Ok((files, failures))
}

fn exit_status(failures: usize) -> i32 {
    i32::from(failures > 0)
}

/// Handles the `rewrite` subcommand.
fn handle_rewrite(engine: &Engine, paths: &[PathBuf], write: bool, json: bool) -> Result<i32, MockshiftError> {
    let (files, mut failures) = load(engine, paths)?;
    let index = engine.type_index(&files)?;
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);

    let mut outcomes = Vec::with_capacity(files.len());
    for file in &files {
        let outcome = engine.rewrite(file, &index);
        let mut written = false;
        if write && outcome.changed() {
            match fs::write(&outcome.path, &outcome.rewritten) {
                Ok(()) => written = true,
                Err(e) => {
                    let err = crate::err_msg!(Io, "cannot write {}: {}", outcome.path.display(), e).with_cause(e);
                    failures.push((outcome.path.clone(), err));
                }
            }
        }
        if !json {
            if outcome.changed() && !write {
                output::write_diff(&mut stdout, &outcome.path, &outcome.original, &outcome.rewritten)?;
            }
            output::write_diagnostics(&mut stderr, &outcome.path, &outcome.original, &outcome.diagnostics)?;
        }
        outcomes.push((outcome, written));
    }

    let failed = failures.len();
    if json {
        let report = RewriteReport {
            files: outcomes.iter().map(|(o, written)| FileReport::new(o, *written)).collect(),
            failures: failures
                .iter()
                .map(|(path, e)| Failure {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })
                .collect(),
        };
        println!("{}", output::to_json(&report)?);
    } else {
        for (_, e) in failures {
            print_error(e);
        }
    }
    Ok(exit_status(failed))
}

/// Handles the `scan` subcommand.
fn handle_scan(engine: &Engine, paths: &[PathBuf], json: bool) -> Result<i32, MockshiftError> {
    let (files, failures) = load(engine, paths)?;
    let index = engine.type_index(&files)?;
    let indexes: Vec<_> = files.iter().map(|f| engine.scan(f, &index)).collect();

    if json {
        println!("{}", output::to_json(&indexes)?);
    } else {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        for file_index in &indexes {
            output::write_index(&mut stdout, file_index)?;
        }
    }
    let failed = failures.len();
    for (_, e) in failures {
        print_error(e);
    }
    Ok(exit_status(failed))
}
