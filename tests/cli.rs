//! End-to-end tests of the mputils binary on temporary trees

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn mputils(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mputils"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn create_tree(root: &Path) {
    fs::create_dir_all(root.join("logs/old")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    for (name, content) in [
        ("readme.txt", "top"),
        ("logs/app.log", "app"),
        ("logs/old/app.1.log", "older"),
    ] {
        File::create(root.join(name))
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }
}

#[test]
fn test_copy_tree() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    create_tree(&src);

    let output = mputils(&["copy", path_arg(&src), path_arg(&dst), "--workers", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(fs::read_to_string(dst.join("readme.txt")).unwrap(), "top");
    assert_eq!(fs::read_to_string(dst.join("logs/old/app.1.log")).unwrap(), "older");
    assert!(dst.join("empty").is_dir());
    assert!(src.join("logs/app.log").exists());
}

#[test]
fn test_move_with_glob() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    create_tree(&src);

    let output = mputils(&[
        "move",
        path_arg(&src),
        path_arg(&dst),
        "--glob",
        "**/*.log",
        "--workers",
        "1",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(fs::read_to_string(dst.join("logs/app.log")).unwrap(), "app");
    assert!(dst.join("logs/old/app.1.log").exists());
    assert!(!src.join("logs/app.log").exists());
    assert!(src.join("readme.txt").exists());
    assert!(!dst.join("readme.txt").exists());
}

#[test]
fn test_move_whole_tree_removes_source_directories() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    create_tree(&src);

    let output = mputils(&["move", path_arg(&src), path_arg(&dst), "--workers", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(dst.join("logs/old").is_dir());
    assert!(dst.join("empty").is_dir());
    assert_eq!(fs::read_dir(&src).unwrap().count(), 0);
}

#[test]
fn test_move_top_level_glob_takes_directory_contents() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    create_tree(&src);

    let output = mputils(&["move", path_arg(&src), path_arg(&dst), "--glob", "*", "--workers", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(fs::read_to_string(dst.join("logs/app.log")).unwrap(), "app");
    assert_eq!(fs::read_to_string(dst.join("logs/old/app.1.log")).unwrap(), "older");
    assert_eq!(fs::read_to_string(dst.join("readme.txt")).unwrap(), "top");
    assert!(dst.join("empty").is_dir());
    assert_eq!(fs::read_dir(&src).unwrap().count(), 0);
}

#[test]
fn test_remove_tree() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    create_tree(&src);

    let output = mputils(&["remove", path_arg(&src), "--workers", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(src.exists());
    assert_eq!(fs::read_dir(&src).unwrap().count(), 0);
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    create_tree(&src);

    let output = mputils(&["remove", path_arg(&src), "--dry-run", "--glob", "*.txt"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("Delete: "));
    assert!(stdout.trim_end().ends_with("readme.txt"));
    assert!(src.join("readme.txt").exists());

    let dst = dir.path().join("dst");
    let output = mputils(&["copy", path_arg(&src), path_arg(&dst), "-n"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(" -> "));
    assert!(!dst.exists());
}

#[test]
fn test_failures_set_exit_code() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    create_tree(&src);

    // only the directories match, and none of them is empty
    let output = mputils(&["remove", path_arg(&src), "--glob", "logs", "--workers", "1"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("generated an exception"));
    assert!(stderr.contains("distinct failure"));
    assert!(src.join("logs/app.log").exists());
}

#[test]
fn test_configuration_errors() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing");
    let output = mputils(&["remove", path_arg(&missing)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Path not found"));

    let output = mputils(&["remove", path_arg(dir.path()), "--workers", "100000"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("The maximum available threads are"));
}
