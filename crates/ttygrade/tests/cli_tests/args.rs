//! CLI argument tests.

use super::{TestResult, ttygrade, write_spec};
use predicates::prelude::*;

#[test]
fn test_arg_help() {
    ttygrade()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Expectation-driven grader for interactive console programs",
        ));
}

#[test]
fn test_arg_version() {
    ttygrade()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ttygrade"));
}

#[test]
fn test_arg_spec_required() {
    ttygrade()
        .assert()
        .failure()
        .stderr(predicate::str::contains("SPEC"));
}

#[test]
fn test_missing_spec_file_is_config_error() {
    ttygrade()
        .arg("/nonexistent/grading.yaml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn test_invalid_spec_is_config_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r"
launch: x
checks:
  - name: broken
    cmd: a
    ok_regex: '[unclosed'
",
    )?;

    ttygrade()
        .arg(spec)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));
    Ok(())
}

#[test]
fn test_unknown_spec_field_is_config_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r"
launch: x
surprise: true
checks:
  - name: ok
    cmd: a
    ok_regex: a
",
    )?;

    ttygrade().arg(spec).assert().code(2);
    Ok(())
}
