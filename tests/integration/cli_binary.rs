//! Integration tests for the bulkop binary: stream separation, log routing
//! and the global configuration file.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the binary with an isolated home and XDG config directory.
fn run_bulkop(temp: &Path, args: &[&str]) -> Output {
    let config_home = temp.join("xdg");
    let home = temp.join("home");
    fs::create_dir_all(&config_home).unwrap();
    fs::create_dir_all(&home).unwrap();

    Command::new(env!("CARGO_BIN_EXE_bulkop"))
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env("HOME", home.as_os_str())
        .env_remove("BULKOP_LOG")
        .env_remove("BULKOP_LOG_FORMAT")
        .env_remove("BULKOP_LOG_OUTPUT")
        .env_remove("BULKOP_LOG_MODULES")
        .env_remove("BULKOP_ENV")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_config_command_reads_global_file_and_logs_to_stderr() {
    let temp = TempDir::new().unwrap();
    let global_dir = temp.path().join("xdg").join("bulkop");
    fs::create_dir_all(&global_dir).unwrap();
    fs::write(
        global_dir.join("config.toml"),
        "[connection]\nendpoint = \"https://global.example.com\"\n",
    )
    .unwrap();
    let workspace = temp.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();

    let output = run_bulkop(
        temp.path(),
        &["--workspace", workspace.to_str().unwrap(), "config"],
    );
    assert!(
        output.status.success(),
        "bulkop config should succeed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("https://global.example.com"));
    assert!(stdout.contains("[batch]"));
    assert!(!stdout.contains("Bulkop CLI starting"), "logs must stay off stdout");
    assert!(stderr.contains("Bulkop CLI starting"));
}

#[test]
fn test_log_output_file_keeps_stderr_clean() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let log_file = temp.path().join("logs").join("bulkop.log");

    let output = run_bulkop(
        temp.path(),
        &[
            "--workspace",
            workspace.to_str().unwrap(),
            "--log-output",
            "file",
            "--log-file",
            log_file.to_str().unwrap(),
            "config",
        ],
    );
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Bulkop CLI starting"));

    let content = fs::read_to_string(&log_file).unwrap();
    assert!(content.contains("Bulkop CLI starting"));
}

#[test]
fn test_what_if_makes_no_calls_and_reports_bad_items() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let input = temp.path().join("records.jsonl");
    fs::write(
        &input,
        "{\"table\":\"account\",\"attributes\":{\"name\":\"Contoso\"}}\n\
         {\"table\":\"account\",\"attributes\":{\"name\":\"Fabrikam\"}}\n\
         {\"attributes\":{}}\n",
    )
    .unwrap();

    // Nothing listens on port 9; what-if must never connect.
    let output = run_bulkop(
        temp.path(),
        &[
            "--workspace",
            workspace.to_str().unwrap(),
            "--endpoint",
            "http://127.0.0.1:9",
            "--quiet",
            "create",
            "--what-if",
            "--input",
            input.to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.trim().is_empty(), "no results without execution");
    assert_eq!(stderr.matches("What if: Create account (new)").count(), 2);
    assert!(stderr.contains("item 3"));
    assert!(stderr.contains("Declined"));
}

#[test]
fn test_missing_endpoint_fails() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();

    let output = run_bulkop(
        temp.path(),
        &["--workspace", workspace.to_str().unwrap(), "--quiet", "delete"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No endpoint configured"));
}
