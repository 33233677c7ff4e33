//! Integration tests for the rota-send binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a feed and a config using the file source and the dry-run publisher
fn setup_test_env(posts: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let feed_path = temp_dir.path().join("posts.json");
    fs::write(&feed_path, posts).unwrap();

    let config_path = temp_dir.path().join("config.toml");
    let config = format!(
        r#"
[state]
history_file = "{history}"
media_usage_file = "{media}"

[schedule]
interval = "1s"

[source]
kind = "file"
path = "{feed}"

[publish]
kind = "log"

[[accounts]]
name = "account1"
"#,
        history = slash(&temp_dir.path().join("history.json")),
        media = slash(&temp_dir.path().join("media_used.json")),
        feed = slash(&feed_path),
    );
    fs::write(&config_path, config).unwrap();

    (temp_dir, config_path)
}

fn slash(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn rota_send() -> Command {
    let mut cmd = Command::cargo_bin("rota-send").unwrap();
    cmd.env_remove("ROTACAST_CONFIG")
        .env_remove("ROTACAST_LOG_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_describes_exit_codes() {
    rota_send()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_once_publishes_and_records_history() -> anyhow::Result<()> {
    let (temp_dir, config_path) =
        setup_test_env(r#"{"posts": [{"id": 7, "content": "hello from rota-send"}]}"#);

    rota_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("rota-send daemon starting"))
        .stderr(predicate::str::contains("hello from rota-send"))
        .stderr(predicate::str::contains("ran one cycle, exiting"));

    let raw = fs::read_to_string(temp_dir.path().join("history.json"))?;
    let history: serde_json::Value = serde_json::from_str(&raw)?;
    assert!(history["account1"]["7"].is_string());
    Ok(())
}

#[test]
fn test_second_run_finds_nothing_eligible() -> anyhow::Result<()> {
    let (temp_dir, config_path) = setup_test_env(r#"{"posts": [{"id": "a", "content": "only"}]}"#);

    for _ in 0..2 {
        rota_send()
            .env("ROTACAST_CONFIG", &config_path)
            .arg("--once")
            .assert()
            .success();
    }

    let raw = fs::read_to_string(temp_dir.path().join("history.json"))?;
    let history: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(history["account1"].as_object().map(|ids| ids.len()), Some(1));
    Ok(())
}

#[test]
fn test_empty_feed_is_not_an_error() {
    let (temp_dir, config_path) = setup_test_env(r#"{"posts": []}"#);

    rota_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .success();

    assert!(!temp_dir.path().join("history.json").exists());
}

#[test]
fn test_interval_override_is_logged() {
    let (_temp_dir, config_path) = setup_test_env(r#"{"posts": []}"#);

    rota_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .arg("--interval")
        .arg("15m")
        .assert()
        .success()
        .stderr(predicate::str::contains("Interval: 15m"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "invalid toml content [[[").unwrap();

    rota_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_config_file_exits_with_config_code() {
    let temp_dir = TempDir::new().unwrap();

    rota_send()
        .arg("--config")
        .arg(temp_dir.path().join("nope.toml"))
        .arg("--once")
        .assert()
        .code(2);
}

#[test]
fn test_json_log_format() {
    let (_temp_dir, config_path) = setup_test_env(r#"{"posts": []}"#);

    rota_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .arg("--log-format")
        .arg("json")
        .assert()
        .success()
        .stderr(predicate::str::contains(r#""message":"rota-send daemon starting""#));
}
