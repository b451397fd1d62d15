//! Core dispatch module
//!
//! Provides the task and outcome model, the thread and process execution
//! backends, and the dispatcher that ties them together.

mod dispatcher;
mod executor;
mod process;
mod task;

pub use dispatcher::*;
pub use executor::*;
pub use process::*;
pub use task::*;
