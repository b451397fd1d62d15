//! Error types for mputils
//!
//! Only infrastructure and configuration problems surface as errors. A task
//! that fails while running is never an error at this level: it is recorded
//! as a [`Failure`](crate::core::Failure) inside its outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mputils operations
#[derive(Error, Debug)]
pub enum MputilsError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Requested worker count exceeds the host ceiling
    #[error("The maximum available threads are {ceiling}, not: {requested}")]
    TooManyWorkers {
        /// Largest allowed worker count
        ceiling: usize,
        /// Worker count that was asked for
        requested: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern as given
        pattern: String,
        /// Parser message
        message: String,
    },

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// A worker process could not be started
    #[error("Failed to spawn worker '{program}': {source}")]
    WorkerSpawn {
        /// Worker program
        program: PathBuf,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// Worker protocol violation
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl MputilsError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError(message.into())
    }

    /// Check if this error was caused by the caller's configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::TooManyWorkers { .. } | Self::ConfigError(_) | Self::InvalidPattern { .. }
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::NotFound(path) => Some(path),
            Self::WorkerSpawn { program, .. } => Some(program),
            _ => None,
        }
    }
}

/// Result type alias for mputils operations
pub type Result<T> = std::result::Result<T, MputilsError>;

impl From<std::io::Error> for MputilsError {
    fn from(err: std::io::Error) -> Self {
        MputilsError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for MputilsError {
    fn from(err: serde_json::Error) -> Self {
        MputilsError::ProtocolError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| MputilsError::io(path, e))
    }
}
