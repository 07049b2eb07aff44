//! Binary tests: argument handling and exit codes of the `reshelf` executable.
//!
//! Every command runs with `HOME` and the working directory pointed at a
//! temporary directory, so no real configuration or manifest is touched.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Sandbox {
    temp_dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("inbox")).unwrap();
        Sandbox { temp_dir }
    }

    fn inbox(&self) -> PathBuf {
        self.temp_dir.path().join("inbox")
    }

    fn manifest(&self) -> PathBuf {
        self.temp_dir.path().join("manifest.jsonl")
    }

    fn write(&self, rel_path: &str, content: &str) {
        let path = self.inbox().join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("reshelf").unwrap();
        cmd.current_dir(self.temp_dir.path())
            .env("HOME", self.temp_dir.path())
            .env_remove("RUST_LOG");
        cmd
    }

    fn with_manifest(&self, args: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--manifest").arg(self.manifest()).args(args);
        cmd
    }

    fn organize(&self) -> Command {
        let mut cmd = self.with_manifest(&["organize"]);
        cmd.arg(self.inbox());
        cmd
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[test]
fn test_organize_then_undo_exits_zero() {
    let sandbox = Sandbox::new();
    sandbox.write("report.pdf", "r");
    sandbox.write("photo.jpg", "p");

    sandbox.organize().assert().success();
    assert!(exists(&sandbox.inbox().join("docs/report.pdf")));
    assert!(exists(&sandbox.inbox().join("images/photo.jpg")));

    sandbox.with_manifest(&["undo"]).assert().success();
    assert!(exists(&sandbox.inbox().join("report.pdf")));
    assert!(exists(&sandbox.inbox().join("photo.jpg")));
    assert!(!exists(&sandbox.inbox().join("docs")));
}

#[test]
fn test_dry_run_exits_zero_and_moves_nothing() {
    let sandbox = Sandbox::new();
    sandbox.write("report.pdf", "r");

    let mut cmd = sandbox.organize();
    cmd.arg("--dry-run").assert().success();

    assert!(exists(&sandbox.inbox().join("report.pdf")));
    assert!(!exists(&sandbox.inbox().join("docs")));
    assert!(!exists(&sandbox.manifest()));
}

#[test]
fn test_stale_entry_exits_one() {
    let sandbox = Sandbox::new();
    sandbox.write("report.pdf", "r");
    sandbox.organize().assert().success();
    fs::remove_file(sandbox.inbox().join("docs/report.pdf")).unwrap();

    sandbox.with_manifest(&["undo"]).assert().code(1);
    assert_eq!(fs::read_to_string(sandbox.manifest()).unwrap(), "");
}

#[test]
fn test_missing_directory_exits_two() {
    let sandbox = Sandbox::new();

    sandbox
        .with_manifest(&["organize"])
        .arg(sandbox.inbox().join("nope"))
        .assert()
        .code(2);
}

#[test]
fn test_corrupt_manifest_exits_two() {
    let sandbox = Sandbox::new();
    fs::write(sandbox.manifest(), "{\"original_path\": \n").unwrap();

    sandbox.with_manifest(&["undo"]).assert().code(2);
}

#[test]
fn test_invalid_config_exits_two() {
    let sandbox = Sandbox::new();
    let config = sandbox.temp_dir.path().join("bad.toml");
    fs::write(&config, "[collisions]\nmax_attempts = 0\n").unwrap();

    sandbox
        .cmd()
        .arg("--config")
        .arg(&config)
        .arg("undo")
        .assert()
        .code(2);
}

#[test]
fn test_local_config_file_is_picked_up() {
    let sandbox = Sandbox::new();
    fs::write(
        sandbox.temp_dir.path().join(".reshelfrc.toml"),
        "[categories]\nebooks = [\"epub\"]\n",
    )
    .unwrap();
    sandbox.write("book.epub", "b");

    sandbox.organize().assert().success();
    assert!(exists(&sandbox.inbox().join("ebooks/book.epub")));
}

#[test]
fn test_default_manifest_lives_under_home() {
    let sandbox = Sandbox::new();
    sandbox.write("notes.txt", "n");

    sandbox
        .cmd()
        .arg("organize")
        .arg(sandbox.inbox())
        .assert()
        .success();

    let default_manifest = sandbox
        .temp_dir
        .path()
        .join(".local/share/reshelf/manifest.jsonl");
    assert!(exists(&default_manifest));
}

#[test]
fn test_undo_with_empty_manifest_exits_zero() {
    let sandbox = Sandbox::new();

    sandbox.with_manifest(&["undo"]).assert().success();
}

#[test]
fn test_usage_errors() {
    let sandbox = Sandbox::new();

    sandbox.cmd().assert().failure();
    sandbox.with_manifest(&["undo", "--last", "0"]).assert().failure();
}
