use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

mod common;

use common::{setup_test_environment, write_test};

/// Writes a `Tester.toml` that runs `*.sh` files under `tests/` with `sh`.
fn write_config(dir: &Path) {
    let config = r#"
jobs = 2
paths = ["tests"]
patterns = ["*.sh"]

[interpreter]
program = "sh"
version = "5.0.0"
"#;
    fs::write(dir.join("Tester.toml"), config).unwrap();
}

fn tester(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tester-runner").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").arg("--lang").arg("en");
    cmd
}

/// A passing suite exits with code 0 and reports success.
/// 全部通过的测试套件以退出码 0 结束并报告成功。
#[test]
fn test_successful_run() {
    let dir = setup_test_environment();
    write_config(dir.path());
    let tests = dir.path().join("tests");
    write_test(&tests, "ok.sh", &["TEST: Always fine"], "echo fine");
    write_test(&tests, "multi.sh", &["@multiple 2"], "exit 0");
    write_test(&tests, "skipped.sh", &["@skip not here"], "exit 1");

    tester(dir.path())
        .arg("run")
        .arg("--config")
        .arg("Tester.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Always fine"))
        .stdout(predicate::str::contains("Passed: 3"))
        .stdout(predicate::str::contains("All tests passed."));
}

/// Any failed test makes the process exit with code 1.
/// 任何失败的测试都会使进程以退出码 1 结束。
#[test]
fn test_failed_run() {
    let dir = setup_test_environment();
    write_config(dir.path());
    let tests = dir.path().join("tests");
    write_test(&tests, "ok.sh", &[], "exit 0");
    write_test(&tests, "broken.sh", &[], "echo 'it broke'; exit 1");

    tester(dir.path())
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Exited with error code 1 (expected 0)"))
        .stdout(predicate::str::contains("it broke"))
        .stdout(predicate::str::contains("Some tests failed."));
}

#[test]
fn test_runner_marker_is_in_environment() {
    let dir = setup_test_environment();
    write_config(dir.path());
    write_test(
        &dir.path().join("tests"),
        "env.sh",
        &[],
        r#"[ "$TESTER_RUNNER" = "1" ] || exit 1"#,
    );

    tester(dir.path()).arg("run").assert().success();
}

/// Positional paths and the interpreter flag override the config file.
/// 位置参数路径和解释器参数会覆盖配置文件。
#[test]
fn test_cli_overrides_config() {
    let dir = setup_test_environment();
    write_config(dir.path());
    write_test(&dir.path().join("tests"), "fails.sh", &[], "exit 1");
    let other = write_test(&dir.path().join("other"), "strict.sh", &[], "set -u; echo \"$UNSET_VAR\"");

    tester(dir.path())
        .arg("run")
        .arg("-p")
        .arg("sh -e")
        .arg("-j")
        .arg("1")
        .arg(&other)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("strict.sh"))
        .stdout(predicate::str::contains("fails.sh").not());
}

#[test]
fn test_missing_test_path_is_a_setup_error() {
    let dir = setup_test_environment();
    write_config(dir.path());

    tester(dir.path())
        .arg("run")
        .arg("nowhere")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_init_creates_config_once() {
    let dir = setup_test_environment();

    tester(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(dir.path().join("Tester.toml").exists());

    tester(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stdout(predicate::str::contains("--force"));

    tester(dir.path()).arg("init").arg("--force").assert().success();
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("tester-runner").unwrap();
    cmd.arg("--lang")
        .arg("en")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init"));
}
