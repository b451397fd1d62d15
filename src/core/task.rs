//! Task and outcome types
//!
//! A task is a callable plus a string-keyed argument mapping. Arguments and
//! results are JSON values so the same task can run on a worker thread or be
//! shipped to a worker process.

use crate::error::{MputilsError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Named arguments of a single task
pub type Arguments = serde_json::Map<String, Value>;

/// Raw result of one invocation, built where the callable ran
pub type TaskResult = std::result::Result<Value, Failure>;

/// A callable the thread backend can invoke
pub type TaskFn = dyn Fn(&Arguments) -> TaskResult + Send + Sync;

/// Failure kind for arguments that do not fit the callable's parameters
pub const KIND_ARGUMENTS: &str = "arguments";
/// Failure kind for a callable that panicked
pub const KIND_PANIC: &str = "panic";
/// Failure kind for a return value that could not be serialized
pub const KIND_SERIALIZATION: &str = "serialization";
/// Failure kind for a function name the worker does not know
pub const KIND_UNKNOWN_FUNCTION: &str = "unknown-function";
/// Failure kind for a worker process that died while running the task
pub const KIND_WORKER_CRASHED: &str = "worker-crashed";

/// Opaque description of why a task failed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Failure {
    /// Failure category (error type name or one of the `KIND_*` constants)
    pub kind: String,
    /// Rendered error message
    pub message: String,
}

impl Failure {
    /// Create a failure descriptor
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Describe an error returned by a callable
    ///
    /// I/O errors are named after their `ErrorKind`, a `Failure` is kept
    /// as is, anything else is named after its type.
    pub fn from_error<E: fmt::Display + 'static>(err: &E) -> Self {
        let any = err as &dyn Any;
        if let Some(failure) = any.downcast_ref::<Failure>() {
            return failure.clone();
        }
        if let Some(MputilsError::Io { source, .. }) = any.downcast_ref::<MputilsError>() {
            return Self::new(format!("{:?}", source.kind()), err.to_string());
        }
        if let Some(io) = any.downcast_ref::<std::io::Error>() {
            return Self::new(format!("{:?}", io.kind()), err.to_string());
        }
        Self::new(short_type_name::<E>(), err.to_string())
    }

    /// Describe a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(KIND_PANIC, message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Recorded result of one completed task
///
/// Exactly one of `result` and `failure` is present. The argument echo is
/// present only when the dispatch asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    result: Option<Value>,
    failure: Option<Failure>,
    arguments: Option<Arguments>,
}

impl Outcome {
    /// Build an outcome from a finished task
    pub fn new(result: TaskResult, arguments: Option<Arguments>) -> Self {
        match result {
            Ok(value) => Self {
                result: Some(value),
                failure: None,
                arguments,
            },
            Err(failure) => Self {
                result: None,
                failure: Some(failure),
                arguments,
            },
        }
    }

    /// Value returned by the callable, on success
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Failure descriptor, on failure
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Echo of the originating arguments, if requested
    pub fn arguments(&self) -> Option<&Arguments> {
        self.arguments.as_ref()
    }

    /// Check if the task succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Adapt a typed function into a [`TaskFn`]
///
/// The argument mapping is deserialized into `A`, which plays the role of
/// keyword-argument unpacking: missing or mistyped arguments become a
/// failure of kind [`KIND_ARGUMENTS`].
pub fn bind<F, A, R, E>(func: F) -> impl Fn(&Arguments) -> TaskResult + Send + Sync
where
    F: Fn(A) -> std::result::Result<R, E> + Send + Sync,
    A: DeserializeOwned,
    R: Serialize,
    E: fmt::Display + 'static,
{
    move |arguments: &Arguments| {
        let params: A = serde_json::from_value(Value::Object(arguments.clone()))
            .map_err(|e| Failure::new(KIND_ARGUMENTS, e.to_string()))?;
        let value = func(params).map_err(|e| Failure::from_error(&e))?;
        serde_json::to_value(value).map_err(|e| Failure::new(KIND_SERIALIZATION, e.to_string()))
    }
}

/// Run a callable, turning a panic into a failure
pub fn invoke(func: &TaskFn, arguments: &Arguments) -> TaskResult {
    catch_unwind(AssertUnwindSafe(|| func(arguments)))
        .unwrap_or_else(|payload| Err(Failure::from_panic(payload)))
}

/// Serialize a parameter struct (or JSON object) into an argument mapping
pub fn to_arguments<T: Serialize + ?Sized>(params: &T) -> Result<Arguments> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        other => Err(MputilsError::config(format!(
            "task arguments must be a mapping, got: {}",
            other
        ))),
    }
}
