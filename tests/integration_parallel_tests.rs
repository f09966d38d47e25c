//! # Parallel Execution Integration Tests / 并行执行集成测试
//!
//! Runs the scheduler over real shell scripts and checks the parallelism
//! budget, lock exclusion and the aggregated summary.
//!
//! 在真实 shell 脚本上运行调度器，检查并行度、锁互斥和汇总结果。

mod common;

use common::{RecordingReporter, setup_test_environment, sh_handler, write_test};
use std::fs;
use std::path::Path;
use tester_runner::core::handler::TestHandler;
use tester_runner::core::models::TestResult;
use tester_runner::core::runner::Runner;
use tester_runner::infra::interpreter::CommandInterpreter;

/// Script that records its start and end in a shared log around a sleep.
/// 在睡眠前后把开始和结束写入共享日志的脚本。
fn logging_body(log: &Path, name: &str, seconds: &str) -> String {
    let log = log.display();
    format!("echo 'start {name}' >> '{log}'\nsleep {seconds}\necho 'end {name}' >> '{log}'")
}

fn read_log(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn position(log: &[String], line: &str) -> usize {
    log.iter()
        .position(|l| l == line)
        .unwrap_or_else(|| panic!("'{line}' missing from {log:?}"))
}

/// Two files sharing a lock never overlap, even with free slots.
/// 共享同一把锁的两个文件即使有空闲槽位也不会同时运行。
#[tokio::test]
async fn test_shared_lock_serializes_jobs() {
    let dir = setup_test_environment();
    let log = dir.path().join("events.log");
    let a = write_test(dir.path(), "a.sh", &["@lock db"], &logging_body(&log, "a", "0.3"));
    let b = write_test(dir.path(), "b.sh", &["@lock db"], &logging_body(&log, "b", "0.3"));

    let runner = Runner::new(sh_handler(), 4);
    let summary = runner.run(&[a, b], &mut RecordingReporter::default()).await.unwrap();

    assert_eq!(summary.passed, 2);
    assert_eq!(read_log(&log), ["start a", "end a", "start b", "end b"]);
}

/// Without the shared lock the same files run side by side.
/// 没有共享锁时，同样的文件会并行运行。
#[tokio::test]
async fn test_unlocked_jobs_overlap() {
    let dir = setup_test_environment();
    let log = dir.path().join("events.log");
    let a = write_test(dir.path(), "a.sh", &["@lock db"], &logging_body(&log, "a", "0.5"));
    let b = write_test(dir.path(), "b.sh", &[], &logging_body(&log, "b", "0.5"));

    let runner = Runner::new(sh_handler(), 2);
    let summary = runner.run(&[a, b], &mut RecordingReporter::default()).await.unwrap();

    assert_eq!(summary.passed, 2);
    let events = read_log(&log);
    assert!(position(&events, "start b") < position(&events, "end a"), "{events:?}");
}

/// A lock-blocked job is passed over for a later runnable one.
/// 被锁阻塞的任务会让位给后续可运行的任务。
#[tokio::test]
async fn test_blocked_job_is_overtaken() {
    let dir = setup_test_environment();
    let log = dir.path().join("events.log");
    let a = write_test(dir.path(), "a.sh", &["@lock db"], &logging_body(&log, "a", "0.4"));
    let b = write_test(dir.path(), "b.sh", &["@lock db"], &logging_body(&log, "b", "0.1"));
    let c = write_test(dir.path(), "c.sh", &[], &logging_body(&log, "c", "0.1"));

    let runner = Runner::new(sh_handler(), 2);
    let mut reporter = RecordingReporter::default();
    runner.run(&[a, b, c], &mut reporter).await.unwrap();

    let events = read_log(&log);
    assert!(position(&events, "start c") < position(&events, "start b"), "{events:?}");
    assert!(position(&events, "end a") < position(&events, "start b"), "{events:?}");

    // Completion order: c finishes first, b last.
    let order: Vec<_> = reporter
        .reported
        .iter()
        .map(|t| t.file().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, ["c.sh", "a.sh", "b.sh"]);
}

#[tokio::test]
async fn test_parallelism_limit_of_one_runs_sequentially() {
    let dir = setup_test_environment();
    let log = dir.path().join("events.log");
    let a = write_test(dir.path(), "a.sh", &[], &logging_body(&log, "a", "0.1"));
    let b = write_test(dir.path(), "b.sh", &[], &logging_body(&log, "b", "0.1"));

    let runner = Runner::new(sh_handler(), 1);
    runner.run(&[a, b], &mut RecordingReporter::default()).await.unwrap();

    assert_eq!(read_log(&log), ["start a", "end a", "start b", "end b"]);
}

/// `multiple 3` becomes three independently scheduled jobs.
/// `multiple 3` 会变为三个独立调度的任务。
#[tokio::test]
async fn test_multiple_variants_are_scheduled_independently() {
    let dir = setup_test_environment();
    let log = dir.path().join("events.log");
    let file = write_test(
        dir.path(),
        "multi.sh",
        &["@multiple 3"],
        &format!("echo \"run $1\" >> '{}'", log.display()),
    );

    let runner = Runner::new(sh_handler(), 3);
    let summary = runner.run(&[file], &mut RecordingReporter::default()).await.unwrap();

    assert_eq!(summary.passed, 3);
    let mut events = read_log(&log);
    events.sort();
    assert_eq!(events, ["run 0", "run 1", "run 2"]);
}

#[tokio::test]
async fn test_summary_counts_every_outcome() {
    let dir = setup_test_environment();
    let files = vec![
        write_test(dir.path(), "pass.sh", &[], "exit 0"),
        write_test(dir.path(), "skip.sh", &["@skip later"], "exit 0"),
        write_test(dir.path(), "skip-exit.sh", &[], "echo 'Skipped: no db'; exit 177"),
        write_test(dir.path(), "fail.sh", &[], "exit 178"),
        write_test(dir.path(), "crash.sh", &[], "exit 255"),
    ];

    let runner = Runner::new(sh_handler(), 2);
    let mut reporter = RecordingReporter::default();
    let summary = runner.run(&files, &mut reporter).await.unwrap();

    assert_eq!(summary.passed, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.total(), 5);
    assert!(!summary.is_success());

    assert_eq!(reporter.begun, Some((5, 2)));
    assert!(reporter.ended);
    assert_eq!(reporter.reported.len(), 5);
    // Variants resolved before running are reported first.
    assert_eq!(reporter.reported[0].result(), TestResult::Skipped);
    assert_eq!(reporter.reported[0].message(), "later");
}

#[tokio::test]
async fn test_all_passing_run_is_success() {
    let dir = setup_test_environment();
    let files = vec![
        write_test(dir.path(), "one.sh", &[], "exit 0"),
        write_test(dir.path(), "two.sh", &["@skip not today"], "exit 1"),
    ];

    let runner = Runner::new(sh_handler(), 2);
    let summary = runner.run(&files, &mut RecordingReporter::default()).await.unwrap();
    assert!(summary.is_success());
}

/// A job whose process cannot start fails without stopping the run.
/// 无法启动进程的任务会失败，但不会中止整个运行。
#[tokio::test]
async fn test_spawn_failure_resolves_failed() {
    let dir = setup_test_environment();
    let file = write_test(dir.path(), "any.sh", &["@lock db"], "exit 0");
    let interpreter = CommandInterpreter::new("tester-runner-no-such-program", vec![], "1.0");

    let runner = Runner::new(TestHandler::new(Box::new(interpreter)), 2);
    let summary = runner
        .run(&[file.clone(), file], &mut RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert!(summary.results.iter().all(|t| t.message().contains("Cannot start")));
}

/// A child whose background process keeps the pipes open does not stall
/// the other jobs: they are assessed and reported first.
/// 后台进程保持管道打开的子进程不会阻塞其他任务：它们会先被评估并报告。
#[tokio::test]
async fn test_open_pipes_do_not_block_other_jobs() {
    let dir = setup_test_environment();
    let lingering = write_test(dir.path(), "lingering.sh", &[], "sleep 3 &\necho started\nexit 0");
    let quick = write_test(dir.path(), "quick.sh", &[], "exit 0");

    let runner = Runner::new(sh_handler(), 2);
    let mut reporter = RecordingReporter::default();
    let summary = runner.run(&[lingering, quick], &mut reporter).await.unwrap();

    assert_eq!(summary.passed, 2);
    let order: Vec<_> = reporter
        .reported
        .iter()
        .map(|test| test.file().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, ["quick.sh", "lingering.sh"]);
    assert_eq!(reporter.reported[1].stdout(), "started\n");
}
