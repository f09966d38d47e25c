//! # Config Module Unit Tests / Config 模块单元测试
//!
//! Tests for loading `Tester.toml`: defaults, full files, path resolution
//! and error reporting.
//!
//! `Tester.toml` 加载的测试：默认值、完整配置、路径解析和错误报告。

mod common;

use common::setup_test_environment;
use std::fs;
use std::path::PathBuf;
use tester_runner::core::config::{RunnerConfig, load_config, parse_config};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = setup_test_environment();
    let config = load_config(&dir.path().join("Tester.toml")).unwrap();

    assert_eq!(config.paths, [dir.path().join("tests")]);
    assert_eq!(config.patterns, ["*.phpt", "*Test.php"]);
    assert_eq!(config.output_dir, PathBuf::from("output"));
    assert_eq!(config.interpreter.program, "php");
    assert!(config.interpreter.version.is_none());
    assert!(config.language.is_none());
}

#[test]
fn test_full_config_is_parsed() {
    let dir = setup_test_environment();
    let path = dir.path().join("Tester.toml");
    fs::write(
        &path,
        r#"
language = "zh-CN"
jobs = 3
paths = ["suite", "/abs/other"]
patterns = ["*.sh"]
show_skipped = true
output_dir = "diag"

[interpreter]
program = "sh"
args = ["-e"]
version = "5.2"
gateway = true
option_flag = "-o"

[env]
APP_ENV = "test"
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.language.as_deref(), Some("zh-CN"));
    assert_eq!(config.jobs, 3);
    assert_eq!(config.paths, [dir.path().join("suite"), PathBuf::from("/abs/other")]);
    assert_eq!(config.patterns, ["*.sh"]);
    assert!(config.show_skipped);
    assert_eq!(config.output_dir, PathBuf::from("diag"));
    assert_eq!(config.interpreter.args, ["-e"]);
    assert_eq!(config.interpreter.version.as_deref(), Some("5.2"));
    assert!(config.interpreter.gateway);
    assert_eq!(config.interpreter.option_flag, "-o");
    assert_eq!(config.env.get("APP_ENV").map(String::as_str), Some("test"));
}

#[test]
fn test_partial_interpreter_table_keeps_defaults() {
    let config = parse_config("[interpreter]\nprogram = \"php8.3\"\n").unwrap();
    assert_eq!(config.interpreter.program, "php8.3");
    assert_eq!(config.interpreter.option_flag, "-d");
    assert_eq!(config.jobs, RunnerConfig::default().jobs);
}

/// Invalid TOML surfaces as an error naming the file.
/// 无效的 TOML 会返回包含文件名的错误。
#[test]
fn test_invalid_toml_is_reported() {
    let dir = setup_test_environment();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[interpreter\nprogram = 1").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.toml"));
}

#[test]
fn test_wrong_type_is_rejected() {
    assert!(parse_config("jobs = \"many\"").is_err());
}
