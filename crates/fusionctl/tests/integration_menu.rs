//! Menu and status command tests
//!
//! Each test runs against its own temp workspace and run directory so state
//! gathering sees exactly what the test set up.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    app: TempDir,
    run: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            app: TempDir::new().unwrap(),
            run: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("fusionctl").unwrap();
        cmd.args(args)
            .arg("--app-dir")
            .arg(self.app.path())
            .arg("--run-dir")
            .arg(self.run.path());
        cmd
    }

    fn mark_installed(&self) {
        std::fs::create_dir_all(self.app.path().join("env")).unwrap();
    }
}

#[test]
fn test_menu_json_fresh_workspace_offers_install_only() {
    let ws = Workspace::new();
    let output = ws.cmd(&["menu", "--output", "json"]).assert().success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    // JSON purity: stdout must parse as a single JSON document
    let items: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["label"], "Install");
    assert_eq!(items[0]["is_default"], true);
    assert_eq!(items[0]["entry"]["kind"], "invoke");
}

#[test]
fn test_menu_json_installed_idle_full_action_set() {
    let ws = Workspace::new();
    ws.mark_installed();
    let output = ws.cmd(&["menu", "--output", "json"]).assert().success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let items: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let items = items.as_array().unwrap();

    let labels: Vec<&str> = items.iter().map(|i| i["label"].as_str().unwrap()).collect();
    assert_eq!(
        labels,
        vec![
            "Start",
            "Start with acceleration",
            "Update",
            "Install",
            "Reset"
        ]
    );
    let defaults = items
        .iter()
        .filter(|i| i["is_default"] == true)
        .count();
    assert_eq!(defaults, 1);
    // Reset carries a confirmation prompt
    assert!(items[4]["confirm"].as_str().is_some());
}

#[test]
fn test_menu_cache_buster_differs_between_invocations() {
    let ws = Workspace::new();
    ws.mark_installed();

    let first = ws.cmd(&["menu", "--output", "json"]).output().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = ws.cmd(&["menu", "--output", "json"]).output().unwrap();
    assert_ne!(first.stdout, second.stdout);
}

#[test]
fn test_menu_text_marks_default() {
    let ws = Workspace::new();
    ws.cmd(&["menu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* Install"));
}

#[test]
fn test_status_json_reports_install_state() {
    let ws = Workspace::new();
    let output = ws.cmd(&["status", "--output", "json"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let state: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(state["installed"], false);

    ws.mark_installed();
    let output = ws.cmd(&["status", "--output", "json"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let state: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(state["installed"], true);
}

#[test]
fn test_status_text_output() {
    let ws = Workspace::new();
    ws.cmd(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed: no"))
        .stdout(predicate::str::contains("Running:   none"));
}

#[test]
fn test_stale_pid_file_does_not_mark_running() {
    let ws = Workspace::new();
    ws.mark_installed();
    // A pid no realistic host assigns; liveness check must reject it
    std::fs::write(ws.run.path().join("update.pid"), "4194304").unwrap();

    let output = ws.cmd(&["status", "--output", "json"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let state: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(state["running"]["update"], false);
}
