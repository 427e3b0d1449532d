// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the `runcx` binary.

use assert_cmd::Command;
use predicates::str::contains;
use std::io::Write;

fn runcx() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("runcx").expect("binary `runcx` should be built")
}

// ── Help & version ──────────────────────────────────────────────────

#[test]
fn help_flag_prints_usage() {
    runcx()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("quote"))
        .stdout(contains("schema"));
}

#[test]
fn version_flag_prints_version() {
    runcx()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

// ── quote / schema ──────────────────────────────────────────────────

#[test]
fn quote_renders_a_command_line() {
    runcx()
        .args(["quote", "echo", "hello world", ""])
        .assert()
        .success()
        .stdout("echo \"hello world\" \"\"\n");
}

#[test]
fn schema_is_json() {
    let out = runcx().arg("schema").assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid JSON");
    assert!(value["properties"]["buffer_size"].is_object());
}

// ── run ─────────────────────────────────────────────────────────────

#[cfg(unix)]
#[test]
fn run_echoes_output_and_succeeds() {
    runcx()
        .args(["run", "--", "echo", "hello"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[cfg(unix)]
#[test]
fn run_exits_with_the_child_code() {
    runcx()
        .args(["run", "--", "sh", "-c", "echo oops; exit 3"])
        .assert()
        .code(3)
        .stdout(contains("oops"));
}

#[cfg(unix)]
#[test]
fn ok_code_still_exits_with_the_child_code() {
    runcx()
        .args(["run", "--ok-code", "0", "--ok-code", "3", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
}

#[cfg(unix)]
#[test]
fn quiet_suppresses_echo() {
    runcx()
        .args(["run", "--quiet", "--", "echo", "hidden"])
        .assert()
        .success()
        .stdout("");
}

#[cfg(unix)]
#[test]
fn json_prints_the_result() {
    let out = runcx()
        .args(["run", "--json", "--env", "RUNCX_X=42", "--", "sh", "-c", "printf %s \"$RUNCX_X\""])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid JSON");
    assert_eq!(value["exit_code"], 0);
    assert_eq!(value["output"], "42");
}

#[cfg(unix)]
#[test]
fn timeout_kills_with_124() {
    runcx()
        .args(["run", "--timeout", "0.3", "--", "sleep", "30"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(124);
}

#[cfg(unix)]
#[test]
fn stdin_file_is_fed_to_the_child() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "from file").unwrap();
    runcx()
        .args(["run", "--stdin-file"])
        .arg(file.path())
        .args(["--", "cat"])
        .assert()
        .success()
        .stdout("from file");
}

#[cfg(unix)]
#[test]
fn echo_prompt_prints_the_command_line() {
    runcx()
        .args(["run", "--echo-prompt", "+ ", "--", "echo", "a b"])
        .assert()
        .success()
        .stdout("+ echo \"a b\"\na b\n");
}

#[cfg(unix)]
#[test]
fn config_file_supplies_success_codes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "success_codes = [0, 5]").unwrap();
    runcx()
        .arg("--config")
        .arg(file.path())
        .args(["run", "--json", "--", "sh", "-c", "exit 5"])
        .assert()
        .code(5)
        .stdout(contains("\"exit_code\": 5"));
}

#[test]
fn invalid_config_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "buffer_size = 0").unwrap();
    runcx()
        .arg("--config")
        .arg(file.path())
        .args(["quote", "x"])
        .assert()
        .failure()
        .stderr(contains("validate config"));
}

#[test]
fn missing_program_fails() {
    runcx()
        .args(["run", "--", "runcx-surely-missing-binary"])
        .assert()
        .failure()
        .stderr(contains("failed to start"));
}

#[test]
fn run_requires_a_command() {
    runcx().arg("run").assert().failure();
}
