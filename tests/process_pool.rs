//! Process backend tests against the built mputils worker

use mputils::core::{
    to_arguments, Arguments, DispatchOptions, Dispatcher, WorkerCeiling, WorkerCommand,
    KIND_ARGUMENTS, KIND_UNKNOWN_FUNCTION, KIND_WORKER_CRASHED,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn worker() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_mputils")).arg("worker")
}

fn dispatcher(workers: usize) -> Dispatcher {
    Dispatcher::new(WorkerCeiling::fixed(4)).with_options(
        DispatchOptions::default()
            .with_workers(workers)
            .with_report_failures(false),
    )
}

fn tasks(value: Value, count: usize) -> Vec<Arguments> {
    (0..count).map(|_| to_arguments(&value).unwrap()).collect()
}

#[test]
fn test_pool_uses_exactly_the_requested_processes() {
    for workers in [1, 2, 4] {
        let outcomes = dispatcher(workers)
            .multiprocess("probe.sleep", tasks(json!({"millis": 50}), 4 * workers), worker())
            .unwrap();

        assert_eq!(outcomes.len(), 4 * workers);
        let pids: HashSet<u64> = outcomes
            .iter()
            .map(|o| o.result().and_then(Value::as_u64).unwrap())
            .collect();
        assert_eq!(pids.len(), workers, "distinct workers for {}", workers);
        assert!(!pids.contains(&u64::from(std::process::id())));
    }
}

#[test]
fn test_processes_run_in_parallel() {
    let start = Instant::now();
    let outcomes = dispatcher(2)
        .multiprocess("probe.sleep", tasks(json!({"millis": 300}), 2), worker())
        .unwrap();
    let elapsed = start.elapsed();

    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(580), "took {:?}", elapsed);
}

#[test]
fn test_crashed_worker_is_isolated() {
    let mut batch = tasks(json!({}), 5);
    batch.insert(2, to_arguments(&json!({"code": 3})).unwrap());

    let outcomes = dispatcher(2)
        .multiprocess("probe.exit", batch, worker())
        .unwrap();

    assert_eq!(outcomes.len(), 6);
    let failures: Vec<_> = outcomes.iter().filter_map(|o| o.failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, KIND_WORKER_CRASHED);

    let crashed = outcomes.iter().find(|o| !o.is_success()).unwrap();
    assert_eq!(crashed.arguments().unwrap()["code"], json!(3));
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 5);
}

#[test]
fn test_unknown_function_and_bad_arguments_are_failures() {
    let outcomes = dispatcher(1)
        .multiprocess("no.such.function", tasks(json!({}), 2), worker())
        .unwrap();
    assert!(outcomes
        .iter()
        .all(|o| o.failure().unwrap().kind == KIND_UNKNOWN_FUNCTION));

    let outcomes = dispatcher(1)
        .multiprocess("probe.sleep", tasks(json!({"millis": "soon"}), 1), worker())
        .unwrap();
    assert_eq!(outcomes[0].failure().unwrap().kind, KIND_ARGUMENTS);
}

#[test]
fn test_file_action_failures_do_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("present.txt");
    std::fs::write(&present, b"x").unwrap();

    let batch = vec![
        to_arguments(&json!({"path": dir.path().join("missing.txt")})).unwrap(),
        to_arguments(&json!({"path": present})).unwrap(),
    ];
    let outcomes = dispatcher(2)
        .multiprocess("remove_file", batch, worker())
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    let failure = outcomes.iter().find_map(|o| o.failure()).unwrap();
    assert_eq!(failure.kind, "NotFound");
    assert!(!present.exists());
}

#[test]
fn test_argument_echo_can_be_disabled() {
    let outcomes = Dispatcher::new(WorkerCeiling::fixed(4))
        .with_options(DispatchOptions::default().with_include_arguments(false))
        .multiprocess("probe.echo", tasks(json!({"n": 1}), 3), worker())
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        assert!(outcome.arguments().is_none());
        assert_eq!(outcome.result(), Some(&json!({"n": 1})));
    }
}

#[test]
fn test_too_many_workers_runs_nothing() {
    let err = dispatcher(5)
        .multiprocess("probe.pid", tasks(json!({}), 1), worker())
        .unwrap_err();
    assert_eq!(err.to_string(), "The maximum available threads are 4, not: 5");
}
