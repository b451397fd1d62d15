//! # mputils - Bounded-concurrency task dispatch
//!
//! mputils runs one callable over a list of argument sets on a bounded pool
//! of workers and reports one [`Outcome`](core::Outcome) per task. A failing
//! task never stops the others: its failure is captured in its outcome and
//! reported on stderr.
//!
//! Two backends are available:
//!
//! - **Threads**: any typed function, run on a rayon pool
//! - **Processes**: a function registered in the worker [`Registry`](worker::Registry),
//!   run in child processes that re-execute the `mputils` binary
//!
//! ## Quick Start
//!
//! ```no_run
//! use mputils::core::{multithread, to_arguments, DispatchOptions, WorkerCeiling};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Number {
//!     number: f64,
//! }
//!
//! fn reciprocal(args: Number) -> Result<f64, String> {
//!     if args.number == 0.0 {
//!         Err("division by zero".to_string())
//!     } else {
//!         Ok(1.0 / args.number)
//!     }
//! }
//!
//! let tasks = (0..4)
//!     .map(|n| to_arguments(&json!({ "number": n })))
//!     .collect::<mputils::Result<Vec<_>>>()
//!     .unwrap();
//!
//! let options = DispatchOptions::default().with_workers(2);
//! let outcomes = multithread(reciprocal, tasks, options, WorkerCeiling::detect()).unwrap();
//! assert_eq!(outcomes.len(), 4);
//! ```
//!
//! ## Worker Processes
//!
//! ```no_run
//! use mputils::core::{to_arguments, Dispatcher, WorkerCeiling, WorkerCommand};
//! use mputils::fs::PathArgs;
//!
//! let tasks = vec![to_arguments(&PathArgs { path: "/tmp/stale.lock".into() }).unwrap()];
//! let outcomes = Dispatcher::new(WorkerCeiling::detect())
//!     .multiprocess("remove_file", tasks, WorkerCommand::current_exe().unwrap())
//!     .unwrap();
//!
//! for outcome in outcomes.iter().filter(|o| !o.is_success()) {
//!     println!("{:?}", outcome.failure());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;
pub mod worker;

// Re-export commonly used types
pub use crate::core::{Arguments, DispatchOptions, Dispatcher, Failure, Outcome, WorkerCeiling};
pub use crate::error::{MputilsError, Result};
pub use crate::progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use mputils::prelude::*;
    //! ```

    pub use crate::core::{
        multiprocess, multithread, to_arguments, Arguments, DispatchOptions, Dispatcher,
        Executor, Failure, Outcome, ProcessExecutor, TaskResult, ThreadExecutor, WorkerCeiling,
        WorkerCommand,
    };
    pub use crate::error::{MputilsError, Result};
    pub use crate::fs::{discover, partition_paths};
    pub use crate::progress::ProgressReporter;
    pub use crate::worker::Registry;
}
