//! Reset command tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(app: &TempDir, run: &TempDir, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("fusionctl").unwrap();
    cmd.args(args)
        .arg("--app-dir")
        .arg(app.path())
        .arg("--run-dir")
        .arg(run.path());
    cmd
}

fn install_fixture(app: &TempDir) {
    std::fs::create_dir_all(app.path().join("env")).unwrap();
    std::fs::create_dir_all(app.path().join("app/models/checkpoints")).unwrap();
    std::fs::write(app.path().join("env/pyvenv.cfg"), "home = /usr\n").unwrap();
}

#[test]
fn test_reset_with_yes_removes_environment_only() {
    let app = TempDir::new().unwrap();
    let run = TempDir::new().unwrap();
    install_fixture(&app);

    cmd(&app, &run, &["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment removed"));

    assert!(!app.path().join("env").exists());
    // Checkouts and models survive a reset
    assert!(app.path().join("app/models/checkpoints").exists());
}

#[test]
fn test_reset_declined_keeps_environment() {
    let app = TempDir::new().unwrap();
    let run = TempDir::new().unwrap();
    install_fixture(&app);

    cmd(&app, &run, &["reset"])
        .write_stdin("n\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reset aborted"));
    assert!(app.path().join("env").exists());
}

#[test]
fn test_reset_confirmed_via_stdin() {
    let app = TempDir::new().unwrap();
    let run = TempDir::new().unwrap();
    install_fixture(&app);

    cmd(&app, &run, &["reset"])
        .write_stdin("y\n")
        .assert()
        .success();
    assert!(!app.path().join("env").exists());
}

#[test]
fn test_reset_without_environment_is_noop() {
    let app = TempDir::new().unwrap();
    let run = TempDir::new().unwrap();

    cmd(&app, &run, &["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to reset"));
}
