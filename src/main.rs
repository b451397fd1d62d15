//! mputils CLI - Parallel file operations over worker processes
//!
//! Also serves as the worker program: `mputils worker` answers tasks on
//! stdin/stdout for the process pool started by the other subcommands.

use clap::Parser;
use mputils::config::{BatchArgs, CliArgs, Commands};
use mputils::core::{to_arguments, Dispatcher, Failure, WorkerCeiling, WorkerCommand};
use mputils::error::Result;
use mputils::fs::{
    depth_levels, discover, expand_path, pair_with_destination, partition_paths, plan_move,
    CopyArgs, MoveArgs, PathArgs,
};
use mputils::progress::ProgressReporter;
use mputils::worker::{run_stdio, Registry};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging; stdout belongs to the worker protocol
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(failures) if failures.is_empty() => {}
        Ok(failures) => {
            let mut lines: Vec<String> = failures.iter().map(Failure::to_string).collect();
            lines.sort();
            eprintln!("{} distinct failure(s):", lines.len());
            for line in lines {
                eprintln!("  {}", line);
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &CliArgs) -> Result<HashSet<Failure>> {
    match &args.command {
        Commands::Worker => {
            let served = run_stdio(&Registry::with_defaults())?;
            tracing::debug!(served, "worker exiting");
            Ok(HashSet::new())
        }
        Commands::Copy {
            source,
            destination,
            batch,
        } => copy(args, source, destination, batch),
        Commands::Move {
            source,
            destination,
            batch,
        } => move_tree(args, source, destination, batch),
        Commands::Remove { source, batch } => remove(args, source, batch),
    }
}

/// Dispatches batches to worker processes and collects their failures
struct BatchRunner {
    dispatcher: Dispatcher,
    command: WorkerCommand,
    failures: HashSet<Failure>,
}

impl BatchRunner {
    fn new(args: &CliArgs, batch: &BatchArgs) -> Result<Self> {
        let ceiling = WorkerCeiling::detect();
        ceiling.check(batch.workers.unwrap_or(ceiling.get()))?;

        let progress = if args.progress && !args.quiet {
            ProgressReporter::new()
        } else {
            ProgressReporter::disabled()
        };
        let dispatcher = Dispatcher::new(ceiling)
            .with_options(batch.dispatch_options())
            .with_progress(progress);

        Ok(Self {
            dispatcher,
            command: WorkerCommand::current_exe()?,
            failures: HashSet::new(),
        })
    }

    fn run<T: Serialize>(&mut self, function: &str, params: &[T]) -> Result<()> {
        if params.is_empty() {
            return Ok(());
        }
        let tasks = params
            .iter()
            .map(|p| to_arguments(p))
            .collect::<Result<Vec<_>>>()?;

        let outcomes = self
            .dispatcher
            .multiprocess(function, tasks, self.command.clone())?;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(function, tasks = outcomes.len(), failed, "batch finished");
        self.failures
            .extend(outcomes.into_iter().filter_map(|o| o.failure().cloned()));
        Ok(())
    }

    fn finish(self) -> HashSet<Failure> {
        if let Some(progress) = self.dispatcher.progress() {
            progress.finish();
            if progress.is_enabled() {
                eprintln!("{}", progress.summary().describe());
            }
        }
        self.failures
    }
}

fn print_pairs(pairs: &[(PathBuf, PathBuf)]) {
    for (src, dst) in pairs {
        println!("{} -> {}", src.display(), dst.display());
    }
}

fn copy(
    args: &CliArgs,
    source: &Path,
    destination: &Path,
    batch: &BatchArgs,
) -> Result<HashSet<Failure>> {
    let source = expand_path(source)?;
    let destination = expand_path(destination)?;
    let paths = discover(&source, &batch.glob)?;
    let pairs = pair_with_destination(&source, &destination, &paths);

    if batch.dry_run {
        print_pairs(&pairs);
        return Ok(HashSet::new());
    }

    let tasks: Vec<CopyArgs> = pairs
        .into_iter()
        .map(|(source, destination)| CopyArgs {
            source,
            destination,
            follow_symlinks: true,
        })
        .collect();

    let mut runner = BatchRunner::new(args, batch)?;
    runner.run("copy_path", &tasks)?;
    Ok(runner.finish())
}

fn move_tree(
    args: &CliArgs,
    source: &Path,
    destination: &Path,
    batch: &BatchArgs,
) -> Result<HashSet<Failure>> {
    let source = expand_path(source)?;
    let destination = expand_path(destination)?;
    let (files, directories) = partition_paths(discover(&source, &batch.glob)?);
    let plan = plan_move(&files, &directories)?;

    let to_moves = |paths: &[PathBuf]| -> Vec<MoveArgs> {
        pair_with_destination(&source, &destination, paths)
            .into_iter()
            .map(|(source, destination)| MoveArgs {
                source,
                destination,
            })
            .collect()
    };

    if batch.dry_run {
        print_pairs(&pair_with_destination(&source, &destination, &plan.entries));
        print_pairs(&pair_with_destination(&source, &destination, &plan.directories));
        return Ok(HashSet::new());
    }

    let mut runner = BatchRunner::new(args, batch)?;
    runner.run("move_path", &to_moves(&plan.entries))?;
    for level in depth_levels(&plan.directories) {
        runner.run("move_dir", &to_moves(&level))?;
    }
    Ok(runner.finish())
}

fn remove(args: &CliArgs, source: &Path, batch: &BatchArgs) -> Result<HashSet<Failure>> {
    let source = expand_path(source)?;
    let (files, directories) = partition_paths(discover(&source, &batch.glob)?);

    if batch.dry_run {
        for path in files.iter().chain(&directories) {
            println!("Delete: {}", path.display());
        }
        return Ok(HashSet::new());
    }

    let to_removals = |paths: Vec<PathBuf>| -> Vec<PathArgs> {
        paths.into_iter().map(|path| PathArgs { path }).collect()
    };

    let mut runner = BatchRunner::new(args, batch)?;
    runner.run("remove_file", &to_removals(files))?;
    for level in depth_levels(&directories) {
        runner.run("remove_dir", &to_removals(level))?;
    }
    Ok(runner.finish())
}
