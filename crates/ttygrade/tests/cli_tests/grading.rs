//! End-to-end grading tests against stub shell children.

use super::{STUB_SPEC, TestResult, ttygrade, write_spec};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_full_score_exits_zero() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(dir.path(), STUB_SPEC)?;
    let report_dir = dir.path().join("report");

    ttygrade()
        .arg(&spec)
        .arg("--report-dir")
        .arg(&report_dir)
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("boot: 5/5 (OK)"))
        .stdout(predicate::str::contains("echo: 10/10 (OK)"))
        .stdout(predicate::str::contains("TOTAL: 15/15"));

    let summary = fs::read_to_string(report_dir.join("summary.txt"))?;
    assert!(summary.contains("TOTAL: 15/15"));

    // The transcript captured the child's answer.
    let transcript = fs::read_to_string(report_dir.join("session.log"))?;
    assert!(transcript.contains("hi"));
    Ok(())
}

#[test]
fn test_partial_credit_exits_one() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r#"
launch: |
  printf 'ready> '
  while read line; do printf 'ready> '; done
prompt: 'ready> '
timeout: 20
resync_timeout: 1
checks:
  - name: boot
    ok_regex: 'ready> '
    points: 5
  - name: echo
    cmd: echo hi
    ok_regex: hi
    points: 10
    timeout: 1
"#,
    )?;

    ttygrade()
        .arg(spec)
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("echo: 0/10 (FAIL)"))
        .stdout(predicate::str::contains("TOTAL: 5/15"));
    Ok(())
}

#[test]
fn test_launch_override() -> TestResult {
    let dir = tempfile::tempdir()?;
    // The spec's own launch command prints nothing useful.
    let spec = write_spec(
        dir.path(),
        r"
launch: sleep 20
prompt: 'ready> '
timeout: 20
resync_timeout: 1
checks:
  - name: boot
    ok_regex: 'ready> '
    points: 5
",
    )?;

    ttygrade()
        .arg(spec)
        .arg("--launch")
        .arg("printf 'ready> '; sleep 20")
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("TOTAL: 5/5"));
    Ok(())
}

#[test]
fn test_timeout_override_bounds_the_run() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r"
launch: sleep 30
prompt: 'ready> '
checks:
  - name: never
    ok_regex: nope
    points: 5
",
    )?;

    ttygrade()
        .arg(spec)
        .arg("--timeout")
        .arg("1")
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("never: 0/5 (FAIL)"))
        .stdout(predicate::str::contains("TOTAL: 0/5"));
    Ok(())
}

#[test]
fn test_clamp_scale_in_summary() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r#"
launch: |
  printf 'ready> '
  while read line; do printf 'hi\nready> '; done
prompt: 'ready> '
timeout: 20
resync_timeout: 1
scale: 10
checks:
  - name: boot
    ok_regex: 'ready> '
    points: 5
  - name: echo
    cmd: echo hi
    ok_regex: hi
    points: 10
"#,
    )?;

    ttygrade()
        .arg(spec)
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("TOTAL: 10/10"));
    Ok(())
}

#[test]
fn test_expected_exit_and_skip_accounting() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r#"
launch: |
  printf 'ready> '
  while read line; do
    case "$line" in
      quit) exit 0;;
      *) printf 'ready> ';;
    esac
  done
prompt: 'ready> '
timeout: 20
resync_timeout: 1
checks:
  - name: boot
    ok_regex: 'ready> '
    points: 5
  - name: shutdown
    cmd: quit
    expect_exit: true
    points: 20
  - name: after
    ok_regex: anything
    points: 10
"#,
    )?;

    ttygrade()
        .arg(spec)
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("shutdown: 20/20 (OK)"))
        .stdout(predicate::str::contains("after: 0/10 (FAIL)"))
        .stdout(predicate::str::contains("TOTAL: 25/35"));
    Ok(())
}

#[test]
fn test_unwritable_report_dir_is_execution_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(dir.path(), STUB_SPEC)?;
    // A plain file where the report directory should go.
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, "")?;

    ttygrade()
        .arg(spec)
        .arg("--report-dir")
        .arg(&blocker)
        .arg("--no-color")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("failed to create"));
    Ok(())
}

#[test]
fn test_verbose_prints_table() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(dir.path(), STUB_SPEC)?;

    ttygrade()
        .arg(spec)
        .arg("--verbose")
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("Check"))
        .stdout(predicate::str::contains("Status"));
    Ok(())
}
