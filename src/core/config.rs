//! # Configuration Module / 配置模块
//!
//! Loads `Tester.toml`. Every field has a default, so a missing file or an
//! empty one both describe a runnable setup.
//!
//! 加载 `Tester.toml`。每个字段都有默认值，因此缺失或为空的配置文件都描述了可运行的设置。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "Tester.toml";

/// How the program under test is invoked.
/// 被测程序的调用方式。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpreterConfig {
    /// Program to run. `~` and `$VAR` are expanded.
    /// 要运行的程序，支持 `~` 和 `$VAR` 展开。
    pub program: String,
    /// Fixed arguments placed right after the program.
    pub args: Vec<String>,
    /// Reported version. Probed with `program --version` when absent.
    /// 报告的版本。未设置时通过 `program --version` 探测。
    pub version: Option<String>,
    /// Whether the program answers with an HTTP-style header preamble.
    pub gateway: bool,
    /// Flag placed in front of every startup option.
    pub option_flag: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: "php".to_string(),
            args: Vec::new(),
            version: None,
            gateway: false,
            option_flag: "-d".to_string(),
        }
    }
}

/// Represents the whole runner configuration, loaded from a TOML file.
/// 代表从 TOML 文件加载的完整运行器配置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// The system locale is used when unset.
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。未设置时使用系统语言。
    pub language: Option<String>,

    /// Maximum number of test processes alive at once.
    /// 同时运行的测试进程的最大数量。
    pub jobs: usize,

    /// Discovery roots, relative to the configuration file.
    /// 测试发现的根路径，相对于配置文件。
    pub paths: Vec<PathBuf>,

    /// Glob patterns matched against test file names.
    /// 与测试文件名匹配的 glob 模式。
    pub patterns: Vec<String>,

    /// Print skip reasons in the final report.
    pub show_skipped: bool,

    /// Directory, relative to each test file, that receives diagnostics.
    /// 相对于每个测试文件、用于存放诊断产物的目录。
    pub output_dir: PathBuf,

    pub interpreter: InterpreterConfig,

    /// Environment overrides applied to every test process.
    /// 应用于每个测试进程的环境变量覆盖。
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            language: None,
            jobs: num_cpus::get(),
            paths: vec![PathBuf::from("tests")],
            patterns: vec!["*.phpt".to_string(), "*Test.php".to_string()],
            show_skipped: false,
            output_dir: PathBuf::from("output"),
            interpreter: InterpreterConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

/// Parses configuration text.
pub fn parse_config(content: &str) -> Result<RunnerConfig> {
    toml::from_str(content).context("Failed to parse runner configuration")
}

/// Loads the configuration at `path`. A missing file yields the defaults;
/// relative discovery roots are resolved against the file's directory.
///
/// 加载 `path` 处的配置。文件不存在时返回默认配置；相对的发现路径基于配置文件所在目录解析。
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?
    } else {
        RunnerConfig::default()
    };

    config.paths = config
        .paths
        .into_iter()
        .map(|p| if p.is_relative() { base.join(p) } else { p })
        .collect();
    Ok(config)
}
