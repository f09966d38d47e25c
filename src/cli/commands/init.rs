//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a commented
//! default `Tester.toml`.
//!
//! 此模块实现 `init` 命令，用于写入带注释的默认 `Tester.toml`。

use anyhow::{Context, Result, bail};
use colored::*;
use std::{fs, path::PathBuf};

use crate::infra::t;

pub const DEFAULT_CONFIG: &str = r#"# Tester Runner Configuration / Tester Runner 配置

# Language for messages; the system language is used when unset
# 消息语言；未设置时使用系统语言
# language = "en"

# Maximum number of test processes running at once (default: CPU count)
# 同时运行的测试进程的最大数量（默认：CPU 数量）
# jobs = 8

# Where to look for tests, relative to this file / 测试查找路径，相对于此文件
paths = ["tests"]

# Test file name globs / 测试文件名 glob 模式
patterns = ["*.phpt", "*Test.php"]

# Print skip reasons in the final report / 在最终报告中打印跳过原因
show_skipped = false

# Diagnostics directory next to each failed test / 失败测试旁的诊断产物目录
output_dir = "output"

[interpreter]
program = "php"
args = []
# Probed with `program --version` when unset / 未设置时通过 `program --version` 探测
# version = "8.2.0"
gateway = false
option_flag = "-d"

# Environment overrides for every test process / 每个测试进程的环境变量覆盖
[env]
"#;

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new configuration file
/// * `force` - Whether to overwrite an existing file
/// * `locale` - Language for messages
pub fn execute(output: PathBuf, force: bool, locale: &str) -> Result<()> {
    if output.exists() && !force {
        println!("{}", t!("init.use_force", locale = locale).yellow());
        bail!(t!("init.file_exists", locale = locale, path = output.display()).to_string());
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                t!("init.create_parent_dir_failed", locale = locale, path = parent.display())
                    .to_string()
            })?;
        }
    }

    fs::write(&output, DEFAULT_CONFIG).with_context(|| {
        t!("init.write_failed", locale = locale, path = output.display()).to_string()
    })?;

    println!(
        "{}",
        t!("init.success", locale = locale, path = output.display()).green()
    );
    println!("{}", t!("init.next_steps", locale = locale));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::parse_config;

    #[test]
    fn default_config_parses() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.patterns, ["*.phpt", "*Test.php"]);
        assert_eq!(config.interpreter.program, "php");
        assert!(config.env.is_empty());
    }
}
