//! Integration tests for the CLI commands, run against temporary files.

use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use warden_cli::commands::apply::{self, ApplyArgs};
use warden_cli::commands::common::{PolicySource, load_policy, read_records};
use warden_cli::commands::validate;
use warden_core::EnginePolicy;
use warden_core::cli::{ExitCode, OutputFormat};

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

const FLAG_SCRIPT: &str = "result = record; result[\"flag\"] = record[\"score\"] > 0.5;";

/// Tests the documented flag scenario end to end, with output to a file.
#[tokio::test]
async fn test_apply_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "flag.rhai", FLAG_SCRIPT);
    let records = write(
        &dir,
        "signals.ndjson",
        "{\"ticker\": \"AAA\", \"score\": 0.9}\n{\"ticker\": \"BBB\", \"score\": 0.1}\n",
    );
    let output = dir.path().join("out.json");

    let code = apply::run(
        ApplyArgs {
            script,
            records,
            output: Some(output.clone()),
            strict: true,
        },
        EnginePolicy::default(),
        OutputFormat::Json,
    )
    .await
    .unwrap();

    assert_eq!(code, ExitCode::SUCCESS);

    let written = read_records(&output).await.unwrap();
    assert_eq!(
        written.into_iter().map(Value::Object).collect::<Value>(),
        json!([
            {"ticker": "AAA", "score": 0.9, "flag": true},
            {"ticker": "BBB", "score": 0.1, "flag": false},
        ])
    );
}

/// Tests that a rejected script maps to its exit code and writes nothing.
#[tokio::test]
async fn test_apply_rejected_script() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "bad.rhai", "import \"os\" as os;");
    let records = write(&dir, "records.json", "[{\"ticker\": \"AAA\"}]");
    let output = dir.path().join("out.json");

    let code = apply::run(
        ApplyArgs {
            script,
            records,
            output: Some(output.clone()),
            strict: false,
        },
        EnginePolicy::default(),
        OutputFormat::Text,
    )
    .await
    .unwrap();

    assert_eq!(code, ExitCode::SCRIPT_REJECTED);
    assert!(!output.exists());
}

/// Tests that malformed records are reported as invalid input.
#[tokio::test]
async fn test_apply_invalid_records() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "flag.rhai", FLAG_SCRIPT);
    let records = write(&dir, "records.json", "[{\"ticker\": \"AAA\"}, 42]");

    let code = apply::run(
        ApplyArgs {
            script,
            records,
            output: None,
            strict: false,
        },
        EnginePolicy::default(),
        OutputFormat::Text,
    )
    .await
    .unwrap();

    assert_eq!(code, ExitCode::INVALID_INPUT);
}

/// Tests that `--strict` turns record failures into a non-zero exit code.
#[tokio::test]
async fn test_apply_strict_record_failures() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "throw.rhai", "if record.score < 0.0 { throw \"negative\"; }");
    let records = write(
        &dir,
        "records.json",
        "[{\"ticker\": \"AAA\", \"score\": 1.0}, {\"ticker\": \"BBB\", \"score\": -1.0}]",
    );

    let run = |strict| {
        apply::run(
            ApplyArgs {
                script: script.clone(),
                records: records.clone(),
                output: None,
                strict,
            },
            EnginePolicy::default(),
            OutputFormat::Text,
        )
    };

    assert_eq!(run(false).await.unwrap(), ExitCode::SUCCESS);
    assert_eq!(run(true).await.unwrap(), ExitCode::RECORD_FAILURES);
}

/// Tests that a missing script file is an error, not an exit code.
#[tokio::test]
async fn test_apply_missing_script() {
    let dir = TempDir::new().unwrap();
    let records = write(&dir, "records.json", "[]");

    let result = apply::run(
        ApplyArgs {
            script: dir.path().join("missing.rhai"),
            records,
            output: None,
            strict: false,
        },
        EnginePolicy::default(),
        OutputFormat::Text,
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("missing.rhai"));
}

/// Tests validate exit codes.
#[tokio::test]
async fn test_validate_exit_codes() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.rhai", FLAG_SCRIPT);
    let bad = write(&dir, "bad.rhai", "let c = record.__class__;");

    let policy = EnginePolicy::default();
    assert_eq!(
        validate::run(&good, &policy, OutputFormat::Json).await.unwrap(),
        ExitCode::SUCCESS
    );
    assert_eq!(
        validate::run(&bad, &policy, OutputFormat::Json).await.unwrap(),
        ExitCode::SCRIPT_REJECTED
    );
}

/// Tests loading an explicit policy file with a timeout override.
#[tokio::test]
async fn test_load_policy_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "policy.toml",
        "identifier_field = \"id\"\nmax_samples = 2\n\n[guards]\nmax_call_depth = 8\n",
    );

    let loaded = load_policy(Some(&path), Some(750)).await.unwrap();

    assert_eq!(loaded.source, PolicySource::File(path));
    assert_eq!(loaded.policy.identifier_field(), "id");
    assert_eq!(loaded.policy.max_samples(), 2);
    assert_eq!(loaded.policy.guards().max_call_depth, 8);
    assert_eq!(loaded.policy.timeout_ms(), 750);
}

/// Tests that invalid policy files are rejected with context.
#[tokio::test]
async fn test_load_policy_invalid() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "policy.toml", "timeout_ms = 0\n");

    let err = load_policy(Some(&path), None).await.unwrap_err();
    assert!(format!("{err:#}").contains("timeout_ms"), "{err:#}");

    let err = load_policy(Some(&path), Some(100)).await;
    assert!(err.is_err(), "file is rejected before the override applies");
}
