// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use tester_runner::core::handler::TestHandler;
use tester_runner::core::models::{Test, TestResult};
use tester_runner::infra::interpreter::CommandInterpreter;
use tester_runner::reporting::Reporter;

/// Version reported by the shell interpreter used in tests.
pub const SH_VERSION: &str = "8.2.0";

pub fn setup_test_environment() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

/// `sh` stands in for the program under test, so fixtures are plain scripts.
pub fn sh_interpreter() -> CommandInterpreter {
    CommandInterpreter::new("sh", vec![], SH_VERSION)
}

pub fn sh_handler() -> TestHandler {
    TestHandler::new(Box::new(sh_interpreter()))
}

/// Writes a shell test script whose leading block carries `annotations`.
/// The block sits inside a heredoc that the shell ignores.
///
/// 写入一个 shell 测试脚本，其开头的注解块位于 shell 会忽略的 heredoc 中。
pub fn write_test(dir: &Path, name: &str, annotations: &[&str], body: &str) -> PathBuf {
    let mut content = String::from(": <<'ANNOTATIONS'\n/**\n");
    for line in annotations {
        content.push_str(" * ");
        content.push_str(line);
        content.push('\n');
    }
    content.push_str(" */\nANNOTATIONS\n");
    content.push_str(body);
    content.push('\n');

    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create test directory");
    }
    fs::write(&path, content).expect("Failed to write test script");
    path
}

pub fn results_of(tests: &[Test], result: TestResult) -> Vec<&Test> {
    tests.iter().filter(|t| t.result() == result).collect()
}

/// Reporter remembering every verdict in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub begun: Option<(usize, usize)>,
    pub reported: Vec<Test>,
    pub ended: bool,
}

impl Reporter for RecordingReporter {
    fn begin(&mut self, files: usize, jobs: usize) {
        self.begun = Some((files, jobs));
    }

    fn report(&mut self, test: &Test, _duration: Option<std::time::Duration>) {
        self.reported.push(test.clone());
    }

    fn end(&mut self, _summary: &tester_runner::core::runner::RunSummary) {
        self.ended = true;
    }
}
