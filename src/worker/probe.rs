//! Probe functions for checking a worker pool
//!
//! Each probe reports the worker's process ID so callers can see which
//! process ran it.

use crate::core::Arguments;
use crate::worker::Registry;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;

/// Arguments of `probe.sleep`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sleep {
    /// How long to sleep
    pub millis: u64,
}

/// Arguments of `probe.exit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exit {
    /// Process exit code; without one the probe only reports the pid
    #[serde(default)]
    pub code: Option<i32>,
}

/// Return the worker's process ID
pub fn pid(_: Arguments) -> Result<u32, Infallible> {
    Ok(std::process::id())
}

/// Sleep, then return the worker's process ID
pub fn sleep(params: Sleep) -> Result<u32, Infallible> {
    std::thread::sleep(Duration::from_millis(params.millis));
    Ok(std::process::id())
}

/// Return the arguments unchanged
pub fn echo(arguments: Arguments) -> Result<Arguments, Infallible> {
    Ok(arguments)
}

/// Terminate the worker process without answering when a code is given
pub fn exit(params: Exit) -> Result<u32, Infallible> {
    if let Some(code) = params.code {
        tracing::warn!(code, "exit requested by probe");
        std::process::exit(code);
    }
    Ok(std::process::id())
}

/// Add the probes to a registry under the `probe.` prefix
pub fn register(registry: &mut Registry) {
    registry
        .register("probe.pid", pid)
        .register("probe.sleep", sleep)
        .register("probe.echo", echo)
        .register("probe.exit", exit);
}
