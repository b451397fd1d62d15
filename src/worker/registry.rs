//! Named functions a worker process can run

use crate::core::{bind, invoke, Arguments, Failure, TaskFn, TaskResult, KIND_UNKNOWN_FUNCTION};
use crate::fs::actions;
use crate::worker::probe;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Function table served by a worker
#[derive(Default)]
pub struct Registry {
    functions: BTreeMap<String, Box<TaskFn>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the file actions and probe functions
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        actions::register(&mut registry);
        probe::register(&mut registry);
        registry
    }

    /// Register a typed function under `name`, replacing any previous entry
    pub fn register<F, A, R, E>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(A) -> std::result::Result<R, E> + Send + Sync + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        self.functions.insert(name.into(), Box::new(bind(func)));
        self
    }

    /// Look up a function
    pub fn get(&self, name: &str) -> Option<&TaskFn> {
        self.functions.get(name).map(|f| &**f)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Run `name` with `arguments`; unknown names and panics become failures
    pub fn call(&self, name: &str, arguments: &Arguments) -> TaskResult {
        match self.get(name) {
            Some(func) => invoke(func, arguments),
            None => Err(Failure::new(
                KIND_UNKNOWN_FUNCTION,
                format!("no function named '{}'", name),
            )),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
