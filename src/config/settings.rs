//! Command-line settings for mputils
//!
//! Defines the CLI arguments and how they map onto dispatch options and the
//! log filter.

use crate::core::DispatchOptions;
use crate::fs::DEFAULT_PATTERN;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// mputils - Parallel file operations over a bounded pool of worker processes
#[derive(Parser, Debug, Clone)]
#[command(name = "mputils")]
#[command(version = crate::VERSION)]
#[command(about = "Copy, move and remove file trees with a pool of worker processes")]
#[command(long_about = r#"
mputils runs one task per file or directory on a bounded pool of worker
processes. A task that fails is reported and the others keep going.

Examples:
  mputils copy ~/data /backup/data             # Copy a tree
  mputils move src dst --glob '**/*.log'       # Move only log files
  mputils remove build --workers 4 --dry-run   # Show what would be deleted
"#)]
pub struct CliArgs {
    /// Verbose output (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Show a progress bar
    #[arg(short = 'p', long, global = true)]
    pub progress: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Copy every matching entry of SOURCE into DESTINATION
    Copy {
        /// Source directory
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Destination directory
        #[arg(value_name = "DESTINATION")]
        destination: PathBuf,
        /// Batch options
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Move every matching entry of SOURCE into DESTINATION
    Move {
        /// Source directory
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Destination directory
        #[arg(value_name = "DESTINATION")]
        destination: PathBuf,
        /// Batch options
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Remove every matching entry of SOURCE
    Remove {
        /// Directory to clean
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Batch options
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Serve tasks over stdin/stdout (started by mputils itself)
    #[command(hide = true)]
    Worker,
}

/// Options shared by the batch subcommands
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BatchArgs {
    /// Glob selecting entries, relative to SOURCE
    #[arg(short = 'g', long, default_value = DEFAULT_PATTERN, value_name = "PATTERN")]
    pub glob: String,

    /// Show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of worker processes (default: one per available CPU)
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,
}

impl BatchArgs {
    /// Dispatch options for this batch
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            workers: self.workers,
            ..Default::default()
        }
    }
}

impl CliArgs {
    /// Default log filter directive implied by `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
