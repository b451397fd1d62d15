//! Progress reporting module
//!
//! Shows how many tasks of a dispatch have completed and how many of them
//! failed.

mod reporter;

pub use reporter::*;
