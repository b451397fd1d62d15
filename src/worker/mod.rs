//! Worker process runtime
//!
//! The process backend starts the mputils binary in worker mode. A worker
//! reads framed requests on stdin, runs the named function from its
//! [`Registry`] and answers on stdout. Logs go to stderr.

pub mod probe;
pub mod protocol;
mod registry;
mod server;

pub use registry::Registry;
pub use server::{run_stdio, serve};
