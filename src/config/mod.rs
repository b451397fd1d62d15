//! Configuration module for mputils
//!
//! Command-line arguments and their mapping onto runtime settings.

mod settings;

pub use settings::*;
