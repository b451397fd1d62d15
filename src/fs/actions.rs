//! Single-entry file actions
//!
//! Each action touches exactly one filesystem entry so a batch of them can
//! be dispatched in parallel. They are registered in the worker registry
//! under their function names.

use crate::error::{IoResultExt, MputilsError, Result};
use crate::worker::Registry;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Arguments of `copy_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyArgs {
    /// Entry to copy
    pub source: PathBuf,
    /// Where the entry ends up
    pub destination: PathBuf,
    /// Copy the target of a symlink rather than the link
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,
}

fn default_follow_symlinks() -> bool {
    true
}

/// Arguments of `move_path` and `move_dir`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveArgs {
    /// Entry to move
    pub source: PathBuf,
    /// Where the entry ends up
    pub destination: PathBuf,
}

/// Arguments of `remove_file` and `remove_dir`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathArgs {
    /// Entry to remove
    pub path: PathBuf,
}

/// Register every action under its function name
pub fn register(registry: &mut Registry) {
    registry
        .register("copy_path", |args: CopyArgs| {
            copy_path(&args.source, &args.destination, args.follow_symlinks)
        })
        .register("move_path", |args: MoveArgs| move_path(&args.source, &args.destination))
        .register("move_dir", |args: MoveArgs| move_dir(&args.source, &args.destination))
        .register("remove_file", |args: PathArgs| remove_file(&args.path))
        .register("remove_dir", |args: PathArgs| remove_dir(&args.path));
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    Ok(())
}

fn create_dir_exist_ok(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(MputilsError::io(path, e)),
    }
}

/// Copy one entry, keeping permissions and timestamps
///
/// A directory is only created at the destination, its contents are left to
/// their own tasks. With `follow_symlinks` off a symlink is recreated as a
/// symlink.
pub fn copy_path(source: &Path, destination: &Path, follow_symlinks: bool) -> Result<()> {
    create_parent(destination)?;

    let metadata = if follow_symlinks {
        fs::metadata(source)
    } else {
        fs::symlink_metadata(source)
    }
    .with_path(source)?;

    if metadata.is_dir() {
        create_dir_exist_ok(destination)
    } else if metadata.file_type().is_symlink() {
        copy_symlink(source, destination)
    } else {
        fs::copy(source, destination).with_path(destination)?;
        copy_times(&metadata, destination)
    }
}

fn copy_times(metadata: &fs::Metadata, destination: &Path) -> Result<()> {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);
    filetime::set_file_times(destination, atime, mtime).with_path(destination)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
    let target = fs::read_link(source).with_path(source)?;
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_file(destination).with_path(destination)?;
    }
    std::os::unix::fs::symlink(&target, destination).with_path(destination)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
    fs::copy(source, destination).with_path(destination)?;
    Ok(())
}

/// Move one entry, falling back to copy + delete across devices
pub fn move_path(source: &Path, destination: &Path) -> Result<()> {
    create_parent(destination)?;

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if crosses_devices(&e) => {
            tracing::debug!(?source, ?destination, "rename crosses devices, copying");
            let metadata = fs::symlink_metadata(source).with_path(source)?;
            if metadata.is_dir() {
                copy_tree(source, destination)?;
                fs::remove_dir_all(source).with_path(source)
            } else {
                copy_path(source, destination, false)?;
                fs::remove_file(source).with_path(source)
            }
        }
        Err(e) => Err(MputilsError::io(source, e)),
    }
}

/// `rename` failed because source and destination are on different devices
fn crosses_devices(err: &io::Error) -> bool {
    err.kind() == ErrorKind::CrossesDevices
}

fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            MputilsError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        copy_path(entry.path(), &destination.join(relative), false)?;
    }
    Ok(())
}

/// Recreate a directory at the destination and remove the emptied source
pub fn move_dir(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).with_path(destination)?;
    fs::remove_dir(source).with_path(source)
}

/// Remove one file or symlink
pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).with_path(path)
}

/// Remove one empty directory
pub fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir(path).with_path(path)
}
