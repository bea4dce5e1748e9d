//! Command-line arguments and subcommands, declared with `clap` derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "mockshift",
    version,
    about = "Rewrites JMockit recording blocks in Java tests into Mockito stubbing and verification calls."
)]
pub struct MockshiftArgs {
    /// Log engine decisions at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file; defaults to mockshift.yaml in the working directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite recording blocks and show the resulting diff.
    Rewrite {
        /// Source files or directories to process.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write the rewritten files in place instead of printing diffs.
        #[arg(long)]
        write: bool,
        /// Print a JSON report instead of diffs.
        #[arg(long)]
        json: bool,
    },
    /// List the recording blocks of each method without changing anything.
    Scan {
        /// Source files or directories to process.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print the index as JSON.
        #[arg(long)]
        json: bool,
    },
}
