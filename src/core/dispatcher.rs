//! Batch dispatcher
//!
//! Validates the worker count, runs every task on the chosen backend and
//! turns each completion into an [`Outcome`]. Outcomes come back in
//! completion order; use the argument echo to match them to inputs.

use crate::core::executor::{Executor, ThreadExecutor};
use crate::core::process::{ProcessExecutor, WorkerCommand};
use crate::core::task::{bind, Arguments, Failure, Outcome, TaskFn};
use crate::error::{MputilsError, Result};
use crate::progress::ProgressReporter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest worker count a dispatch may request
///
/// Computed from the parallelism available to this process. Create it once
/// at startup and hand it to every [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCeiling(usize);

impl WorkerCeiling {
    /// Detect the ceiling from the host (honours the CPU affinity mask)
    pub fn detect() -> Self {
        Self(num_cpus::get().max(1))
    }

    /// Use a fixed ceiling
    pub fn fixed(ceiling: usize) -> Self {
        Self(ceiling.max(1))
    }

    /// Ceiling value
    pub fn get(self) -> usize {
        self.0
    }

    /// Validate a requested worker count
    pub fn check(self, requested: usize) -> Result<usize> {
        if requested == 0 {
            return Err(MputilsError::config("worker count must be at least 1"));
        }
        if requested > self.0 {
            return Err(MputilsError::TooManyWorkers {
                ceiling: self.0,
                requested,
            });
        }
        Ok(requested)
    }
}

impl Default for WorkerCeiling {
    fn default() -> Self {
        Self::detect()
    }
}

/// Per-dispatch options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Number of workers (None = ceiling)
    pub workers: Option<usize>,
    /// Print every failing task to stderr
    pub report_failures: bool,
    /// Echo each task's arguments in its outcome
    pub include_arguments: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            workers: None,
            report_failures: true,
            include_arguments: true,
        }
    }
}

impl DispatchOptions {
    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Enable or disable failure reports on stderr
    pub fn with_report_failures(mut self, report: bool) -> Self {
        self.report_failures = report;
        self
    }

    /// Enable or disable the argument echo
    pub fn with_include_arguments(mut self, include: bool) -> Self {
        self.include_arguments = include;
        self
    }
}

/// Runs batches of tasks on an executor
pub struct Dispatcher {
    ceiling: WorkerCeiling,
    options: DispatchOptions,
    progress: Option<ProgressReporter>,
}

impl Dispatcher {
    /// Create a dispatcher with default options
    pub fn new(ceiling: WorkerCeiling) -> Self {
        Self {
            ceiling,
            options: DispatchOptions::default(),
            progress: None,
        }
    }

    /// Set dispatch options
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Ceiling in use
    pub fn ceiling(&self) -> WorkerCeiling {
        self.ceiling
    }

    /// Options in use
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Progress reporter shared by every dispatch of this dispatcher
    pub fn progress(&self) -> Option<&ProgressReporter> {
        self.progress.as_ref()
    }

    /// Run every task on `executor` and collect one outcome per task
    ///
    /// Fails only if the worker count is invalid or the pool cannot be set
    /// up; in both cases no task has run.
    pub fn dispatch<X: Executor + ?Sized>(
        &self,
        executor: &X,
        function: &X::Function,
        tasks: Vec<Arguments>,
    ) -> Result<Vec<Outcome>> {
        let workers = self
            .ceiling
            .check(self.options.workers.unwrap_or(self.ceiling.get()))?;

        let total = tasks.len();
        tracing::debug!(executor = executor.name(), workers, tasks = total, "dispatching");

        if let Some(progress) = &self.progress {
            progress.add_total(total as u64);
        }

        let report_failures = self.options.report_failures;
        let include_arguments = self.options.include_arguments;
        let progress = self.progress.as_ref();
        let mut outcomes = Vec::with_capacity(total);

        executor.run_all(function, tasks, workers, &mut |result, arguments| {
            if let Err(failure) = &result {
                if report_failures {
                    let report = FailureReport { arguments: &arguments, failure };
                    match progress {
                        Some(progress) => progress.suspend(|| eprintln!("{}", report)),
                        None => eprintln!("{}", report),
                    }
                }
                tracing::debug!(%failure, "task failed");
            }
            if let Some(progress) = progress {
                progress.record(result.is_ok());
            }
            outcomes.push(Outcome::new(result, include_arguments.then_some(arguments)));
        })?;

        debug_assert_eq!(outcomes.len(), total);
        Ok(outcomes)
    }

    /// Run a typed function on a fresh thread pool
    pub fn multithread<F, A, R, E>(&self, func: F, tasks: Vec<Arguments>) -> Result<Vec<Outcome>>
    where
        F: Fn(A) -> std::result::Result<R, E> + Send + Sync + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        let bound = bind(func);
        let function: &TaskFn = &bound;
        self.dispatch(&ThreadExecutor, function, tasks)
    }

    /// Run a registered worker function on a fresh pool of worker processes
    pub fn multiprocess(
        &self,
        function: &str,
        tasks: Vec<Arguments>,
        command: WorkerCommand,
    ) -> Result<Vec<Outcome>> {
        self.dispatch(&ProcessExecutor::new(command), function, tasks)
    }
}

struct FailureReport<'a> {
    arguments: &'a Arguments,
    failure: &'a Failure,
}

impl fmt::Display for FailureReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments = serde_json::to_string(self.arguments).unwrap_or_default();
        write!(f, "<{}> generated an exception: {}", arguments, self.failure)
    }
}

/// Run a typed function over `tasks` on a thread pool bounded by `ceiling`
pub fn multithread<F, A, R, E>(
    func: F,
    tasks: Vec<Arguments>,
    options: DispatchOptions,
    ceiling: WorkerCeiling,
) -> Result<Vec<Outcome>>
where
    F: Fn(A) -> std::result::Result<R, E> + Send + Sync + 'static,
    A: DeserializeOwned + 'static,
    R: Serialize + 'static,
    E: fmt::Display + 'static,
{
    Dispatcher::new(ceiling)
        .with_options(options)
        .multithread(func, tasks)
}

/// Run a registered worker function over `tasks` on worker processes started
/// with `command`, bounded by `ceiling`
pub fn multiprocess(
    function: &str,
    tasks: Vec<Arguments>,
    options: DispatchOptions,
    ceiling: WorkerCeiling,
    command: WorkerCommand,
) -> Result<Vec<Outcome>> {
    Dispatcher::new(ceiling)
        .with_options(options)
        .multiprocess(function, tasks, command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::to_arguments;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[derive(Deserialize)]
    struct Number {
        number: f64,
    }

    #[derive(Debug)]
    struct ZeroDivision;

    impl fmt::Display for ZeroDivision {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "division by zero")
        }
    }

    fn reciprocal(args: Number) -> std::result::Result<f64, ZeroDivision> {
        if args.number == 0.0 {
            Err(ZeroDivision)
        } else {
            Ok(1.0 / args.number)
        }
    }

    fn always_fails(_: Arguments) -> std::result::Result<(), ZeroDivision> {
        Err(ZeroDivision)
    }

    fn numbers(values: &[f64]) -> Vec<Arguments> {
        values
            .iter()
            .map(|n| to_arguments(&json!({ "number": n })).unwrap())
            .collect()
    }

    fn dispatcher(workers: usize) -> Dispatcher {
        Dispatcher::new(WorkerCeiling::fixed(4)).with_options(
            DispatchOptions::default()
                .with_workers(workers)
                .with_report_failures(false),
        )
    }

    #[test]
    fn test_too_many_workers_fails_before_running() {
        let err = dispatcher(1024)
            .multithread(reciprocal, numbers(&[1.0, 2.0]))
            .unwrap_err();
        assert_eq!(err.to_string(), "The maximum available threads are 4, not: 1024");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = dispatcher(0).multithread(reciprocal, numbers(&[1.0])).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_all_success() {
        let outcomes = dispatcher(2)
            .multithread(reciprocal, numbers(&[1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.failure().is_none()));
    }

    #[test]
    fn test_all_failures_still_produce_outcomes() {
        let outcomes = dispatcher(2)
            .multithread(always_fails, numbers(&[1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.result().is_none());
            assert_eq!(outcome.failure().unwrap().kind, "ZeroDivision");
        }
    }

    #[test]
    fn test_reciprocal_scenario() {
        let outcomes = dispatcher(2)
            .multithread(reciprocal, numbers(&[1.0, 2.0, 0.0]))
            .unwrap();
        assert_eq!(outcomes.len(), 3);

        let failed: Vec<_> = outcomes.iter().filter(|o| o.failure().is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].arguments().unwrap()["number"], json!(0.0));

        let mut results: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| o.result().and_then(|v| v.as_f64()))
            .collect();
        results.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(results, vec![0.5, 1.0]);
    }

    #[test]
    fn test_argument_echo_can_be_suppressed() {
        let dispatcher = Dispatcher::new(WorkerCeiling::fixed(2)).with_options(
            DispatchOptions::default()
                .with_include_arguments(false)
                .with_report_failures(false),
        );
        let outcomes = dispatcher
            .multithread(reciprocal, numbers(&[1.0, 0.0]))
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.arguments().is_none()));
    }

    #[test]
    fn test_empty_task_list() {
        let outcomes = dispatcher(1).multithread(reciprocal, Vec::new()).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_pool_size_is_exact() {
        for workers in [1, 2, 4] {
            let tasks = (0..4 * workers)
                .map(|i| to_arguments(&json!({ "arg": i })).unwrap())
                .collect();
            let outcomes = dispatcher(workers)
                .multithread(
                    |_: Arguments| -> std::result::Result<String, ZeroDivision> {
                        std::thread::sleep(Duration::from_millis(20));
                        Ok(std::thread::current().name().unwrap_or_default().to_string())
                    },
                    tasks,
                )
                .unwrap();

            let names: HashSet<_> = outcomes
                .iter()
                .map(|o| o.result().unwrap().as_str().unwrap().to_string())
                .collect();
            assert_eq!(names.len(), workers);
        }
    }

    #[test]
    fn test_tasks_run_in_parallel() {
        let delay = Duration::from_millis(300);
        let start = Instant::now();
        let outcomes = dispatcher(2)
            .multithread(
                move |_: Arguments| -> std::result::Result<(), ZeroDivision> {
                    std::thread::sleep(delay);
                    Ok(())
                },
                vec![Arguments::new(), Arguments::new()],
            )
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 2);
        assert!(elapsed > delay);
        assert!(elapsed < delay * 2);
    }

    #[test]
    fn test_entry_point_takes_ceiling() {
        let options = DispatchOptions::default().with_report_failures(false);
        let err = multithread(
            reciprocal,
            numbers(&[1.0]),
            options.clone().with_workers(2),
            WorkerCeiling::fixed(1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MputilsError::TooManyWorkers { ceiling: 1, requested: 2 }
        ));

        // workers default to the ceiling that was passed in
        let outcomes =
            multithread(reciprocal, numbers(&[2.0, 0.0]), options, WorkerCeiling::fixed(1)).unwrap();
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn test_failure_reports_with_progress_bar() {
        let dispatcher = dispatcher(2).with_progress(ProgressReporter::disabled());
        let mut options = dispatcher.options().clone();
        options.report_failures = true;
        let dispatcher = dispatcher.with_options(options);

        let outcomes = dispatcher
            .multithread(reciprocal, numbers(&[1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(outcomes.len(), 3);

        let summary = dispatcher.progress().unwrap().summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn test_ceiling_check() {
        let ceiling = WorkerCeiling::fixed(3);
        assert_eq!(ceiling.check(3).unwrap(), 3);
        assert!(ceiling.check(4).is_err());
        assert!(WorkerCeiling::detect().get() >= 1);
        assert_eq!(WorkerCeiling::fixed(0).get(), 1);
    }
}
