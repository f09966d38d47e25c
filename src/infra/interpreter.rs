//! # Interpreter Module / 解释器模块
//!
//! Describes how a test program is invoked. Every test file works on its own
//! clone of the base interpreter, because the `ini` annotation adds startup
//! options that must not leak into other files.
//!
//! 描述如何调用被测程序。每个测试文件都使用基础解释器的独立副本，
//! 因为 `ini` 注解添加的启动选项不能影响其他文件。

use anyhow::{Context, Result, bail};
use std::cmp::Ordering;
use std::fmt;
use tokio::process::Command;

use crate::infra::command::spawn_and_capture;

/// The program that executes test files.
pub trait Interpreter: fmt::Debug + Send + Sync {
    /// Program followed by its arguments. The test file and the variant's
    /// arguments are appended by the job.
    fn command_line(&self) -> Vec<String>;

    fn version(&self) -> &str;

    /// Whether the program answers with an HTTP-style header preamble.
    fn is_gateway(&self) -> bool;

    fn add_startup_option(&mut self, key: &str, value: Option<&str>);

    fn clone_box(&self) -> Box<dyn Interpreter>;
}

impl Clone for Box<dyn Interpreter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Interpreter described by a plain command line, e.g. `php -n` or `sh`.
/// 由普通命令行描述的解释器，例如 `php -n` 或 `sh`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInterpreter {
    program: String,
    args: Vec<String>,
    version: String,
    gateway: bool,
    option_flag: String,
    startup_options: Vec<String>,
}

impl CommandInterpreter {
    pub fn new(program: impl Into<String>, args: Vec<String>, version: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            version: version.into(),
            gateway: false,
            option_flag: "-d".to_string(),
            startup_options: Vec::new(),
        }
    }

    pub fn with_gateway(mut self, gateway: bool) -> Self {
        self.gateway = gateway;
        self
    }

    /// Flag placed in front of every startup option (`-d` by default).
    pub fn with_option_flag(mut self, flag: impl Into<String>) -> Self {
        self.option_flag = flag.into();
        self
    }

    /// Determines the version by running `program [args] --version` and
    /// taking the first dotted, digit-led token of its output.
    ///
    /// 通过运行 `program --version` 并取输出中第一个以数字开头的点分记号来确定版本。
    pub async fn probe_version(program: &str, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(args).arg("--version").kill_on_drop(true);

        let (status, output) = spawn_and_capture(cmd).await;
        let status = status.with_context(|| format!("Failed to run interpreter '{program}'"))?;
        if !status.success() {
            bail!("Interpreter '{program} --version' exited with {status}");
        }

        parse_version(&output)
            .map(str::to_string)
            .with_context(|| format!("Cannot determine version of interpreter '{program}'"))
    }
}

impl Interpreter for CommandInterpreter {
    fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .chain(self.startup_options.iter().cloned())
            .collect()
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn is_gateway(&self) -> bool {
        self.gateway
    }

    fn add_startup_option(&mut self, key: &str, value: Option<&str>) {
        let option = match value {
            Some(value) => format!("{key}={value}"),
            None => key.to_string(),
        };
        self.startup_options.push(self.option_flag.clone());
        self.startup_options.push(option);
    }

    fn clone_box(&self) -> Box<dyn Interpreter> {
        Box::new(self.clone())
    }
}

/// Compares two version strings part by part. Numeric parts compare as
/// numbers, others lexically; a missing part sorts before a present one,
/// so `8.1 < 8.1.0`.
///
/// 逐段比较两个版本字符串。数字段按数值比较，其他段按字典序比较。
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.trim()
            .split(['.', '-', '+', '_'])
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(left), split(right));

    for (a, b) in left.iter().zip(right.iter()) {
        let ordering = match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => a.cmp(b),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn parse_version(output: &str) -> Option<&str> {
    output
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .map(|token| token.trim_start_matches('v'))
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()) && token.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_first_dotted_number() {
        let output = "PHP 8.2.7 (cli) (built: Jun  8 2023 15:27:40) (NTS)";
        assert_eq!(parse_version(output), Some("8.2.7"));
        assert_eq!(parse_version("GNU bash, version 5.2.15(1)-release"), Some("5.2.15"));
        assert_eq!(parse_version("no digits"), None);
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("8.10.0", "8.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("7.4", "7.4"), Ordering::Equal);
        assert_eq!(compare_versions("8.1", "8.1.0"), Ordering::Less);
        assert_eq!(compare_versions("8.3.0-RC1", "8.3.0"), Ordering::Greater);
    }

    #[test]
    fn startup_options_follow_base_args() {
        let mut php = CommandInterpreter::new("php", vec!["-n".into()], "8.2.0");
        php.add_startup_option("memory_limit", Some("1G"));
        php.add_startup_option("display_errors", None);
        assert_eq!(
            php.command_line(),
            ["php", "-n", "-d", "memory_limit=1G", "-d", "display_errors"]
        );
    }
}
