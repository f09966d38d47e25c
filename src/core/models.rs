//! # Data Models Module / 数据模型模块
//!
//! This module defines the `Test` value type that flows through the whole
//! pipeline: the handler expands a source file into `Test` variants, each
//! unresolved variant is bound to a `Job`, and the finished job is assessed
//! back into a `Test` carrying its verdict.
//!
//! 此模块定义了贯穿整个流程的 `Test` 值类型：处理器将源文件展开为多个 `Test` 变体，
//! 每个未决变体绑定到一个 `Job`，完成的任务再被评估为带有结论的 `Test`。

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Verdict of a single test variant.
/// 单个测试变体的结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestResult {
    /// No verdict yet. The variant still needs to run.
    /// 尚无结论，变体仍需运行。
    Unresolved,
    Passed,
    Skipped,
    Failed,
}

impl TestResult {
    /// Returns `true` for every state except `Unresolved`.
    pub fn is_terminal(self) -> bool {
        self != TestResult::Unresolved
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestResult::Unresolved => "unresolved",
            TestResult::Passed => "passed",
            TestResult::Skipped => "skipped",
            TestResult::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Key of an accumulated argument. All positional values share one slot and
/// are passed bare in insertion order; named values become `--name=value`.
/// 累积参数的键。所有位置参数共用一个槽并按插入顺序原样传递；命名参数渲染为 `--name=value`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ArgKey {
    Positional,
    Named(String),
}

impl ArgKey {
    pub fn named(name: impl Into<String>) -> Self {
        ArgKey::Named(name.into())
    }
}

/// One concrete invocation of a test file and its eventual verdict.
///
/// `Test` has value semantics. The only ways to derive a changed `Test` are
/// [`Test::with_arguments`], [`Test::with_result`] and [`Test::with_output`],
/// all of which leave `self` untouched and return a new value. Sibling
/// variants branched from the same parent therefore never observe each
/// other's changes.
///
/// 测试文件的一次具体调用及其最终结论。
/// `Test` 具有值语义：所有更新操作都返回新值而不修改原值，
/// 因此从同一父级派生的兄弟变体之间互不影响。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Test {
    file: PathBuf,
    title: String,
    /// Insertion ordered. Values under one key accumulate, never overwrite.
    arguments: Vec<(ArgKey, Vec<String>)>,
    result: TestResult,
    message: String,
    stdout: String,
    stderr: String,
}

impl Test {
    pub fn new(file: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            title: title.into(),
            arguments: Vec::new(),
            result: TestResult::Unresolved,
            message: String::new(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn arguments(&self) -> &[(ArgKey, Vec<String>)] {
        &self.arguments
    }

    /// All values accumulated under `key`, in insertion order.
    pub fn argument(&self, key: &ArgKey) -> &[String] {
        self.arguments
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn result(&self) -> TestResult {
        self.result
    }

    pub fn has_result(&self) -> bool {
        self.result.is_terminal()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns a copy with `args` appended to the accumulated arguments.
    /// Existing values are kept; a repeated key gains additional values.
    ///
    /// 返回追加了 `args` 的副本。已有值保留，重复的键只会追加新值。
    pub fn with_arguments<I, V>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = (ArgKey, V)>,
        V: Into<String>,
    {
        let mut me = self.clone();
        for (key, value) in args {
            let value = value.into();
            match me.arguments.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => me.arguments.push((key, vec![value])),
            }
        }
        me
    }

    /// Returns a copy carrying a terminal verdict.
    /// 返回带有最终结论的副本。
    pub fn with_result(&self, result: TestResult, message: impl Into<String>) -> Self {
        debug_assert!(
            !self.has_result(),
            "test '{}' already resolved as {}",
            self.title,
            self.result
        );
        let mut me = self.clone();
        me.result = result;
        me.message = message.into();
        me
    }

    /// Returns a copy carrying the captured output of its execution.
    pub fn with_output(&self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let mut me = self.clone();
        me.stdout = stdout.into();
        me.stderr = stderr.into();
        me
    }

    /// Command-line arguments for this variant: named values become
    /// `--name=value`, positional values are passed bare.
    ///
    /// 此变体的命令行参数：命名参数渲染为 `--name=value`，位置参数原样传递。
    pub fn job_arguments(&self) -> Vec<String> {
        self.arguments
            .iter()
            .flat_map(|(key, values)| {
                values.iter().map(move |value| match key {
                    ArgKey::Positional => value.clone(),
                    ArgKey::Named(name) => format!("--{name}={value}"),
                })
            })
            .collect()
    }

    /// Title followed by the rendered arguments, e.g. `title [--method=testFoo]`.
    pub fn signature(&self) -> String {
        let args = self.job_arguments();
        if args.is_empty() {
            self.title.clone()
        } else {
            format!("{} [{}]", self.title, args.join(" "))
        }
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}
