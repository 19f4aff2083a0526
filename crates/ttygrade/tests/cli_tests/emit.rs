//! JSON result document tests.

use super::{STUB_SPEC, TestResult, ttygrade, write_spec};
use std::fs;

#[test]
fn test_emit_writes_result_document() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(dir.path(), STUB_SPEC)?;
    let out = dir.path().join("results.json");

    ttygrade()
        .arg(spec)
        .arg("--emit")
        .arg(&out)
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .success();

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out)?)?;
    assert_eq!(doc["score"], 15);
    assert_eq!(doc["max_score"], 15);

    let tests = doc["tests"]
        .as_array()
        .ok_or("tests is not an array")?;
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["name"], "boot");
    assert_eq!(tests[0]["score"], 5);
    assert_eq!(tests[0]["max_score"], 5);
    assert_eq!(tests[0]["status"], "passed");
    assert_eq!(tests[1]["name"], "echo");

    assert!(doc["timestamp"].as_str().is_some_and(|t| t.contains('T')));
    Ok(())
}

#[test]
fn test_emit_on_failing_run() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(
        dir.path(),
        r"
launch: sleep 20
prompt: 'ready> '
timeout: 2
checks:
  - name: boot
    ok_regex: 'ready> '
    points: 5
  - name: echo
    cmd: echo hi
    ok_regex: hi
    points: 10
",
    )?;
    let out = dir.path().join("results.json");

    ttygrade()
        .arg(spec)
        .arg("--emit")
        .arg(&out)
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .code(1);

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out)?)?;
    assert_eq!(doc["score"], 0);
    assert_eq!(doc["max_score"], 15);
    let tests = doc["tests"]
        .as_array()
        .ok_or("tests is not an array")?;
    assert_eq!(tests[0]["status"], "timed_out");
    Ok(())
}

#[test]
fn test_emit_to_stdout() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(dir.path(), STUB_SPEC)?;

    let assert = ttygrade()
        .arg(spec)
        .arg("--emit")
        .arg("-")
        .arg("--report-dir")
        .arg(dir.path().join("report"))
        .arg("--no-color")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let json_start = stdout.find('{').ok_or("no JSON in stdout")?;
    let doc: serde_json::Value = serde_json::from_str(&stdout[json_start..])?;
    assert_eq!(doc["score"], 15);
    Ok(())
}
