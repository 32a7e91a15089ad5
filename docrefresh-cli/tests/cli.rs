use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use docrefresh_core::{state, RepoKey, RepoState};

const DATED: &str = "---\nversion: 1.0\ndate: 2026-01-01\n---\n";

fn docrefresh_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("docrefresh"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("DOCREFRESH_REMOTE_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn make_repo(workspace: &TempDir, with_changelog: bool) -> PathBuf {
    let repo = workspace.path().join("demo");
    fs::create_dir_all(&repo).expect("create repo");
    fs::write(repo.join("README.md"), format!("{DATED}# Demo\n")).expect("readme");
    fs::write(repo.join("META.yaml"), "version: \"1.0.0\"\ndate: 2026-01-01\n").expect("meta");
    if with_changelog {
        fs::write(repo.join("CHANGELOG.md"), format!("{DATED}# Changelog\n")).expect("changelog");
    }
    repo
}

#[test]
fn init_writes_manifest_once() {
    let home = TempDir::new().expect("home");
    let manifest = home.path().join(".docrefresh").join("canonical_docs.yaml");

    docrefresh_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote default manifest"));
    assert!(predicates::path::exists().eval(&manifest));

    fs::write(&manifest, "version: \"1.0\"\ntiers: {}\n").expect("edit manifest");
    docrefresh_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already present"));
    assert_eq!(
        fs::read_to_string(&manifest).expect("read"),
        "version: \"1.0\"\ntiers: {}\n"
    );

    docrefresh_cmd(home.path())
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(contains("Wrote default manifest"));
    assert!(fs::read_to_string(&manifest).expect("read").contains("README.md"));
}

#[test]
fn dry_run_prints_plan_and_persists_nothing() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let repo = make_repo(&workspace, true);

    docrefresh_cmd(home.path())
        .arg("run")
        .arg(&repo)
        .assert()
        .success()
        .stdout(contains("# Sync Plan: demo"))
        .stdout(contains("### Add (3 docs)"))
        .stdout(contains("[dry-run]"));

    assert!(!home.path().join(".docrefresh").join("state").exists());
}

#[test]
fn compact_output_and_validation_failure_exit_code() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let repo = make_repo(&workspace, false);

    docrefresh_cmd(home.path())
        .args(["run", "--validate-only", "--compact"])
        .arg(&repo)
        .assert()
        .code(1)
        .stdout(contains("demo: INVALID [simple] 2/8 docs, 1E/"));
}

#[test]
fn json_summary_is_machine_readable() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let repo = make_repo(&workspace, true);

    let output = docrefresh_cmd(home.path())
        .args(["run", "--sync-only", "--json", "--target"])
        .arg(&repo)
        .output()
        .expect("run docrefresh");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["repo"], "demo");
    assert_eq!(value["valid"], true);
    assert_eq!(value["applied"], false);
}

#[test]
fn missing_path_is_an_operational_error() {
    let home = TempDir::new().expect("home");
    docrefresh_cmd(home.path())
        .args(["run", "/definitely/not/here"])
        .assert()
        .code(2)
        .stderr(contains("cannot resolve path"));
}

#[test]
fn apply_without_remote_is_an_operational_error() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let repo = make_repo(&workspace, true);

    docrefresh_cmd(home.path())
        .args(["run", "--apply"])
        .arg(&repo)
        .assert()
        .code(2)
        .stderr(contains("--apply requires a remote endpoint"));
}

#[test]
fn explicit_missing_manifest_is_an_operational_error() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let repo = make_repo(&workspace, true);

    docrefresh_cmd(home.path())
        .args(["run", "--manifest"])
        .arg(home.path().join("nope.yaml"))
        .arg(&repo)
        .assert()
        .code(2)
        .stderr(contains("failed to load document manifest"));
}

#[test]
fn status_lists_stored_repositories() {
    let home = TempDir::new().expect("home");

    docrefresh_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No repositories tracked yet"));

    let stored = RepoState {
        notebook_id: Some("nb-42".into()),
        meta_version: Some("1.0.0".into()),
        ..RepoState::default()
    };
    state::save_at(home.path(), &RepoKey::from("demo"), &stored).expect("save state");

    docrefresh_cmd(home.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains("\"repo\": \"demo\"").and(contains("\"notebook_id\": \"nb-42\"")))
        .stdout(contains("\"status\": \"never_synced\""));
}
