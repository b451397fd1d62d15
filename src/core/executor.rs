//! Execution backends
//!
//! An executor runs one function over many argument sets with a fixed number
//! of execution units and reports every finished task back to the caller in
//! completion order. Task failures are values, never errors: `run_all` only
//! fails when the pool itself cannot be set up.

use crate::core::task::{invoke, Arguments, TaskFn, TaskResult};
use crate::error::{MputilsError, Result};
use crossbeam::channel::unbounded;

/// Callback receiving each finished task with its originating arguments
pub type CompletionSink<'a> = dyn FnMut(TaskResult, Arguments) + 'a;

/// A parallel executor with a bounded pool of execution units
pub trait Executor {
    /// What the executor needs to know to run the task's callable
    type Function: ?Sized;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Run `function` once per argument set on exactly `max_workers` units
    ///
    /// Blocks until every task has finished. `on_complete` is called on the
    /// calling thread once per task, in completion order.
    fn run_all(
        &self,
        function: &Self::Function,
        tasks: Vec<Arguments>,
        max_workers: usize,
        on_complete: &mut CompletionSink<'_>,
    ) -> Result<()>;
}

/// Shared-memory backend: a dedicated rayon thread pool per call
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl ThreadExecutor {
    /// Prefix of the pool's thread names
    pub const THREAD_PREFIX: &'static str = "mputils-worker";
}

impl Executor for ThreadExecutor {
    type Function = TaskFn;

    fn name(&self) -> &'static str {
        "thread"
    }

    fn run_all(
        &self,
        function: &TaskFn,
        tasks: Vec<Arguments>,
        max_workers: usize,
        on_complete: &mut CompletionSink<'_>,
    ) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|index| format!("{}-{}", Self::THREAD_PREFIX, index))
            .build()
            .map_err(|e| MputilsError::ThreadPoolError(e.to_string()))?;

        tracing::debug!(workers = max_workers, tasks = tasks.len(), "thread pool started");

        let (done_tx, done_rx) = unbounded();

        pool.in_place_scope(|scope| {
            for arguments in tasks {
                let done_tx = done_tx.clone();
                scope.spawn(move |_| {
                    let result = invoke(function, &arguments);
                    let _ = done_tx.send((result, arguments));
                });
            }
            drop(done_tx);

            for (result, arguments) in done_rx.iter() {
                on_complete(result, arguments);
            }
        });

        tracing::debug!("thread pool finished");
        Ok(())
    }
}
