//! Path discovery for batch file actions
//!
//! Walks a source tree, filters it with a glob, and orders the result so
//! children are always handled before their parent directory.

use crate::error::{IoResultExt, MputilsError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Pattern matching every entry below the root
pub const DEFAULT_PATTERN: &str = "**/*";

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| MputilsError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Every entry below `root` whose root-relative path matches `pattern`
///
/// The root itself is never returned. `*` stays within one path component,
/// `**` spans directories. Results are sorted.
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(MputilsError::NotFound(root.to_path_buf()));
    }
    let matcher = build_matcher(pattern)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            MputilsError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    tracing::debug!(root = %root.display(), pattern, found = paths.len(), "discovered paths");
    Ok(paths)
}

/// Split paths into `(files, directories)`
///
/// Files come back sorted, directories reverse sorted so a child precedes
/// its parent. Symlinks count as files, even when they point at a directory.
pub fn partition_paths(paths: impl IntoIterator<Item = PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let (mut directories, mut files): (Vec<_>, Vec<_>) = paths.into_iter().partition(|path| {
        std::fs::symlink_metadata(path)
            .map(|m| m.is_dir())
            .unwrap_or(false)
    });
    files.sort();
    directories.sort_by(|a, b| b.cmp(a));
    (files, directories)
}

fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Group directories by depth, deepest level first
///
/// Every directory in a level can be handled in parallel once the levels
/// before it are done.
pub fn depth_levels(directories: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    let mut levels: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
    for dir in directories {
        levels.entry(depth(dir)).or_default().push(dir.clone());
    }
    levels
        .into_iter()
        .rev()
        .map(|(_, mut level)| {
            level.sort();
            level
        })
        .collect()
}

/// How a set of selected paths is moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovePlan {
    /// Files, and directories moved whole, in one batch
    pub entries: Vec<PathBuf>,
    /// Directories emptied by `entries`, recreated and removed level by level
    pub directories: Vec<PathBuf>,
}

/// Decide how each selected path is moved
///
/// A selected directory whose whole subtree was also selected is emptied by
/// its children's moves and then moved on its own. Any other selected
/// directory is moved whole together with its contents, and selected paths
/// below it are dropped.
pub fn plan_move(files: &[PathBuf], directories: &[PathBuf]) -> Result<MovePlan> {
    let selected: HashSet<&Path> = files
        .iter()
        .chain(directories)
        .map(PathBuf::as_path)
        .collect();

    let mut by_depth: Vec<&PathBuf> = directories.iter().collect();
    by_depth.sort_by_key(|dir| std::cmp::Reverse(depth(dir)));

    // children are decided before their parent
    let mut complete: HashMap<&Path, bool> = HashMap::new();
    for dir in by_depth {
        let mut all_selected = true;
        for entry in std::fs::read_dir(dir).with_path(dir)? {
            let child = entry.with_path(dir)?.path();
            let covered = match selected.get(child.as_path()) {
                Some(path) => complete.get(path).copied().unwrap_or(true),
                None => false,
            };
            if !covered {
                all_selected = false;
                break;
            }
        }
        complete.insert(dir.as_path(), all_selected);
    }

    let whole: Vec<&Path> = directories
        .iter()
        .map(PathBuf::as_path)
        .filter(|dir| !complete.get(dir).copied().unwrap_or(true))
        .collect();
    let inside_whole = |path: &Path| whole.iter().any(|w| path != *w && path.starts_with(w));

    let mut plan = MovePlan::default();
    for file in files {
        if !inside_whole(file) {
            plan.entries.push(file.clone());
        }
    }
    for dir in directories {
        if inside_whole(dir) {
            continue;
        }
        if complete.get(dir.as_path()).copied().unwrap_or(true) {
            plan.directories.push(dir.clone());
        } else {
            plan.entries.push(dir.clone());
        }
    }
    plan.entries.sort();
    Ok(plan)
}

/// Map each source path to the same relative location under `destination_root`
pub fn pair_with_destination(
    source_root: &Path,
    destination_root: &Path,
    paths: &[PathBuf],
) -> Vec<(PathBuf, PathBuf)> {
    paths
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(source_root).unwrap_or(path);
            (path.clone(), destination_root.join(relative))
        })
        .collect()
}

/// Expand a leading `~` and make the path absolute
///
/// Existing paths are canonicalized; a path that does not exist yet (such as
/// a fresh destination) is resolved against the current directory.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| MputilsError::config("cannot expand '~': no home directory"))?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    if expanded.exists() {
        return expanded
            .canonicalize()
            .map_err(|e| MputilsError::io(&expanded, e));
    }
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        let cwd = std::env::current_dir().map_err(|e| MputilsError::io(".", e))?;
        Ok(cwd.join(expanded))
    }
}
