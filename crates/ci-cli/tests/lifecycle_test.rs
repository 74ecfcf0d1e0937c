use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn status_reports_not_running_for_a_fresh_project() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("oak-ci").unwrap();
    cmd.arg("--project-root").arg(dir.path()).arg("status");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn stop_on_a_fresh_project_reports_not_running() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("oak-ci").unwrap();
    cmd.arg("--project-root").arg(dir.path()).arg("stop");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn logs_on_a_fresh_project_reports_no_log_file() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("oak-ci").unwrap();
    cmd.arg("--project-root").arg(dir.path()).arg("logs");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("no log file"));
}

#[test]
fn help_runs_without_a_subcommand() {
    let mut cmd = Command::cargo_bin("oak-ci").unwrap();
    cmd.assert().success();
}
