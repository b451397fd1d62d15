//! Isolated-process backend
//!
//! Each execution unit is a child process running the worker loop from
//! [`crate::worker`], driven by one supervisor thread. Functions are named
//! entries of the worker's registry, so only the name and JSON arguments
//! cross the process boundary.

use crate::core::executor::{CompletionSink, Executor};
use crate::core::task::{Arguments, Failure, TaskResult, KIND_WORKER_CRASHED};
use crate::error::{MputilsError, Result};
use crate::worker::protocol::{read_frame, write_frame, write_magic, Request, Response};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::borrow::Cow;
use std::ffi::OsString;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;

/// How to start one worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl WorkerCommand {
    /// Subcommand that puts the mputils binary in worker mode
    pub const WORKER_SUBCOMMAND: &'static str = "worker";

    /// Create a command for an arbitrary worker program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Re-run the current executable as a worker
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| MputilsError::config(format!("Cannot locate current executable: {}", e)))?;
        Ok(Self::new(exe).arg(Self::WORKER_SUBCOMMAND))
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the worker
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program path
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    fn spawn(&self) -> Result<WorkerProcess> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| MputilsError::WorkerSpawn {
                program: self.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MputilsError::protocol("worker stdio was not captured"));
        };

        let mut process = WorkerProcess {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            next_id: 0,
        };
        if let Some(stdin) = process.stdin.as_mut() {
            write_magic(stdin)?;
        }

        tracing::debug!(pid = process.child.id(), "worker process started");
        Ok(process)
    }
}

/// A running worker process and its pipes
struct WorkerProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl WorkerProcess {
    /// Send one request and wait for its response
    fn call(&mut self, function: &str, arguments: &Arguments) -> Result<TaskResult> {
        let id = self.next_id;
        self.next_id += 1;

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MputilsError::protocol("worker input already closed"))?;
        let request = Request {
            id,
            function: Cow::Borrowed(function),
            arguments: Cow::Borrowed(arguments),
        };
        write_frame(stdin, &request)?;

        let response: Response = read_frame(&mut self.stdout)?
            .ok_or_else(|| MputilsError::protocol("worker closed its output"))?;
        if response.id != id {
            return Err(MputilsError::protocol(format!(
                "response for request {} while waiting for {}",
                response.id, id
            )));
        }
        Ok(response.outcome.into())
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        // closing stdin ends the worker loop
        self.stdin.take();
        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::debug!(pid = self.child.id(), %status, "worker process exited")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(pid = self.child.id(), "failed to reap worker: {}", e),
        }
    }
}

/// Isolated-process backend
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: WorkerCommand,
}

impl ProcessExecutor {
    /// Create an executor spawning workers with `command`
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    /// Worker command in use
    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }
}

impl Executor for ProcessExecutor {
    type Function = str;

    fn name(&self) -> &'static str {
        "process"
    }

    fn run_all(
        &self,
        function: &str,
        tasks: Vec<Arguments>,
        max_workers: usize,
        on_complete: &mut CompletionSink<'_>,
    ) -> Result<()> {
        // Start every worker before submitting anything
        let workers = (0..max_workers)
            .map(|_| self.command.spawn())
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(workers = max_workers, tasks = tasks.len(), "process pool started");

        let (task_tx, task_rx) = unbounded();
        for arguments in tasks {
            let _ = task_tx.send(arguments);
        }
        drop(task_tx);

        let (done_tx, done_rx) = unbounded();

        thread::scope(|scope| {
            for (slot, process) in workers.into_iter().enumerate() {
                let task_rx = task_rx.clone();
                let done_tx = done_tx.clone();
                let command = &self.command;
                thread::Builder::new()
                    .name(format!("mputils-supervisor-{}", slot))
                    .spawn_scoped(scope, move || {
                        supervise(slot, process, command, function, task_rx, done_tx)
                    })
                    .map_err(|e| MputilsError::ThreadPoolError(e.to_string()))?;
            }
            drop(done_tx);

            for (result, arguments) in done_rx.iter() {
                on_complete(result, arguments);
            }
            Ok::<(), MputilsError>(())
        })?;

        tracing::debug!("process pool finished");
        Ok(())
    }
}

/// Feed tasks to one worker process until the queue is empty
fn supervise(
    slot: usize,
    process: WorkerProcess,
    command: &WorkerCommand,
    function: &str,
    tasks: Receiver<Arguments>,
    done: Sender<(TaskResult, Arguments)>,
) {
    let mut process = Some(process);

    for arguments in tasks.iter() {
        let result = match process.as_mut() {
            Some(worker) => worker.call(function, &arguments),
            None => command.spawn().and_then(|worker| {
                process.insert(worker).call(function, &arguments)
            }),
        };

        let result = result.unwrap_or_else(|e| {
            let pid = process.as_ref().map(|w| w.child.id());
            tracing::warn!(slot, ?pid, "worker lost while running '{}': {}", function, e);
            if let Some(mut worker) = process.take() {
                worker.kill();
            }
            Err(Failure::new(
                KIND_WORKER_CRASHED,
                format!("worker process failed while running '{}': {}", function, e),
            ))
        });

        if done.send((result, arguments)).is_err() {
            break;
        }
    }
}
