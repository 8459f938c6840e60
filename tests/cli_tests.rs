use std::io::Write;
use std::process::Command;

fn promql_binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_promql-editor"));
    command.env_remove("PROMQL_EDITOR_CONFIG").env_remove("RUST_LOG");
    command
}

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    f.write_all(content.as_bytes()).expect("write temp file");
    f
}

#[test]
fn test_cli_check_error_formatted() {
    let output = promql_binary()
        .args(["check", "foo and 1"])
        .output()
        .expect("run promql-editor");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("set operator not allowed in binary scalar expression"),
        "expected the checker message in stderr, got: {}",
        stderr
    );
    assert!(
        stderr.contains("E0001"),
        "expected error code E0001 in stderr, got: {}",
        stderr
    );
    assert!(
        !stderr.contains("InvalidExpression {"),
        "stderr contains raw Debug output: {}",
        stderr
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_check_ok() {
    let output = promql_binary()
        .args(["check", "sum by (job) (rate(http_requests_total[5m]))"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OK"));
}

#[test]
fn test_cli_check_file() {
    let f = write_temp("foo + bool bar\n", ".promql");
    let output = promql_binary()
        .args(["check", "--file", f.path().to_str().unwrap()])
        .output()
        .expect("run promql-editor");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("bool modifier can only be used on comparison operators"),
        "got: {}",
        stderr
    );
    assert!(!output.status.success());
}

#[test]
fn test_cli_check_json() {
    let output = promql_binary()
        .args(["check", "--json", "foo and 1"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());

    let diagnostics: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("diagnostics are JSON");
    assert_eq!(diagnostics[0]["from"], 0);
    assert_eq!(diagnostics[0]["to"], 9);
    assert_eq!(diagnostics[0]["severity"], "error");
}

#[test]
fn test_cli_complete_offline() {
    let output = promql_binary()
        .args(["complete", "sum b", "--offline"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());

    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("completions are JSON");
    assert_eq!(result["to"], 5);
    let labels: Vec<&str> = result["options"]
        .as_array()
        .expect("options")
        .iter()
        .filter_map(|c| c["label"].as_str())
        .collect();
    assert!(labels.contains(&"by"));
    assert!(labels.contains(&"offset"));
}

#[test]
fn test_cli_complete_nothing() {
    let output = promql_binary()
        .args(["complete", "foo + 1"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");
}

#[test]
fn test_cli_parse() {
    let output = promql_binary()
        .args(["parse", "up"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("PromQL("), "got: {}", stdout);
    assert!(stdout.contains("VectorSelector"), "got: {}", stdout);
}

#[test]
fn test_cli_config_file() {
    let config = write_temp(r#"{"complete": {"offline": true}, "log_level": "warn"}"#, ".json");
    let output = promql_binary()
        .args(["--config", config.path().to_str().unwrap(), "check", "up"])
        .output()
        .expect("run promql-editor");
    assert!(output.status.success());
}

#[test]
fn test_cli_missing_config_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let missing = dir.path().join("absent.json");
    let output = promql_binary()
        .args(["--config", missing.to_str().unwrap(), "check", "up"])
        .output()
        .expect("run promql-editor");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_cli_online_without_url() {
    let config = write_temp(r#"{"complete": {"offline": false}}"#, ".json");
    let output = promql_binary()
        .args(["--config", config.path().to_str().unwrap(), "complete", "up"])
        .output()
        .expect("run promql-editor");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no url configured"));
}
