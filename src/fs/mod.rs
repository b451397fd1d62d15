//! File system module
//!
//! Single-entry file actions that run as dispatched tasks, and the path
//! discovery that turns a source tree into batches of them.

pub mod actions;
mod scanner;

pub use actions::{copy_path, move_dir, move_path, remove_dir, remove_file, CopyArgs, MoveArgs, PathArgs};
pub use scanner::*;
