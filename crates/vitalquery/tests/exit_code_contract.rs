use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_REJECTED: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn vitalquery(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vitalquery"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("VITALQUERY_DB")
        .env_remove("VITALQUERY_LLM_BASE_URL")
        .env_remove("VITALQUERY_LLM_MODEL")
        .env_remove("VITALQUERY_RECURSION_LIMIT")
        .env_remove("VITALQUERY_LOG")
        .output()
        .expect("command should execute")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be one JSON document")
}

#[test]
fn missing_required_args_exits_with_usage_code() {
    let dir = unique_temp_dir("vitalquery-exit-usage");
    let output = vitalquery(&dir, &["validate"]);
    assert_eq!(output.status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn valid_sql_exits_successfully_with_envelope() {
    let dir = unique_temp_dir("vitalquery-exit-valid");
    let output = vitalquery(
        &dir,
        &["validate", "SELECT MAX(e.stress) FROM event e JOIN users u ON u.id = e.protectee_id"],
    );

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["command"], "validate");
    assert_eq!(envelope["meta"]["schema_version"], "vitalquery.envelope.v1");
}

#[test]
fn rejected_sql_exits_with_rejection_code_and_envelope_on_stdout() {
    let dir = unique_temp_dir("vitalquery-exit-rejected");
    let output = vitalquery(&dir, &["validate", "SELECT e.mood FROM event e"]);

    assert_eq!(output.status.code(), Some(EXIT_REJECTED));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"]["code"], "schema_violation");
}

#[test]
fn missing_database_exits_with_runtime_code() {
    let dir = unique_temp_dir("vitalquery-exit-runtime");
    let output = vitalquery(&dir, &["ask", "박주연의 스트레스 평균", "--no-intent-gate"]);

    assert_eq!(output.status.code(), Some(EXIT_RUNTIME_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sqlite database not found"), "{stderr}");
}

#[test]
fn schema_prints_strict_facts() {
    let dir = unique_temp_dir("vitalquery-exit-schema");
    let output = vitalquery(&dir, &["schema"]);

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("SCHEMA (STRICT):"));
    assert!(stdout.contains("event.protectee_id = users.id"));
}

#[test]
fn normalize_prints_rewritten_sql() {
    let dir = unique_temp_dir("vitalquery-exit-normalize");
    let output = vitalquery(
        &dir,
        &[
            "normalize",
            "SELECT e.hrv FROM event e",
            "--metric",
            "hrv",
            "--question",
            "HRV 최저값은?",
        ],
    );

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(
        envelope["data"]["sql"],
        "SELECT e.hrv FROM event e WHERE e.timestamp IS NOT NULL AND e.timestamp <> '' ORDER BY e.hrv ASC, e.timestamp DESC LIMIT 1"
    );
}
