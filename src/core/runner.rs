//! # Runner Module / 调度器模块
//!
//! The runner is the only scheduler. It expands every file through the
//! [`TestHandler`], queues the resulting jobs in discovery order and starts
//! them under two constraints: at most `jobs` children run at once, and no
//! two running jobs hold the same lock name.
//!
//! A job blocked only by a lock is passed over in favor of the next runnable
//! one. Results are reported in completion order.
//!
//! 调度器是唯一的调度者。它通过 [`TestHandler`] 展开每个文件，按发现顺序排队任务，
//! 并在两个约束下启动它们：同时运行的子进程不超过 `jobs` 个，且任意两个运行中的任务不持有同名锁。
//! 仅被锁阻塞的任务会让位给后续可运行的任务。结果按完成顺序报告。

use anyhow::Result;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::handler::TestHandler;
use crate::core::job::{CODE_ERROR, Job, RUN_SLEEP, RunMode};
use crate::core::models::{Test, TestResult};
use crate::reporting::console::Reporter;

/// Aggregated outcome of one run.
/// 一次运行的汇总结果。
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Failed variants whose process crashed with the error exit code.
    /// 进程以错误退出码崩溃的失败变体数量。
    pub errors: usize,
    /// Every resolved variant in completion order.
    pub results: Vec<Test>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// `true` iff nothing failed and no process crashed unexpectedly.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    fn record(&mut self, test: Test, exit_code: Option<i32>) {
        match test.result() {
            TestResult::Passed => self.passed += 1,
            TestResult::Skipped => self.skipped += 1,
            TestResult::Failed => {
                self.failed += 1;
                if exit_code == Some(CODE_ERROR) {
                    self.errors += 1;
                }
            }
            TestResult::Unresolved => {}
        }
        self.results.push(test);
    }
}

/// Test scheduler.
/// 测试调度器。
pub struct Runner {
    handler: TestHandler,
    jobs: usize,
}

impl Runner {
    /// Creates a runner that keeps at most `jobs` processes alive; zero is
    /// treated as one.
    pub fn new(handler: TestHandler, jobs: usize) -> Self {
        Self {
            handler,
            jobs: jobs.max(1),
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Runs every test file in `files` and reports each variant through
    /// `reporter` as soon as it has a verdict.
    ///
    /// 运行 `files` 中的所有测试文件，每个变体得出结论后立即通过 `reporter` 报告。
    pub async fn run(&self, files: &[PathBuf], reporter: &mut dyn Reporter) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut queue = VecDeque::new();

        reporter.begin(files.len(), self.jobs);
        for file in files {
            let initiation = self.handler.initiate(file).await;
            for test in initiation.resolved() {
                reporter.report(test, None);
                summary.record(test.clone(), None);
            }
            queue.extend(initiation.jobs);
        }

        let mut scheduler = Scheduler {
            queue,
            running: Vec::with_capacity(self.jobs),
            held_locks: HashSet::new(),
        };
        while !scheduler.is_idle() {
            for failed in scheduler.start_runnable(self.jobs).await {
                reporter.report(&failed, None);
                summary.record(failed, None);
            }

            let (finished, broken) = scheduler.collect_finished().await;
            for failed in broken {
                reporter.report(&failed, None);
                summary.record(failed, None);
            }
            if finished.is_empty() {
                if !scheduler.running.is_empty() {
                    tokio::time::sleep(RUN_SLEEP).await;
                }
                continue;
            }
            for job in finished {
                let test = self.handler.assess(&job);
                reporter.report(&test, Some(job.duration()));
                summary.record(test, Some(job.exit_code()));
            }
        }

        summary.duration = started.elapsed();
        reporter.end(&summary);
        Ok(summary)
    }
}

/// Scheduling state owned by a single `run` call.
struct Scheduler {
    queue: VecDeque<Job>,
    running: Vec<Job>,
    held_locks: HashSet<String>,
}

impl Scheduler {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty()
    }

    fn is_runnable(&self, job: &Job) -> bool {
        job.locks().iter().all(|lock| !self.held_locks.contains(lock))
    }

    /// Starts queued jobs until the running set is full or nothing left in
    /// the queue is runnable. Returns the variants whose process could not
    /// be spawned.
    async fn start_runnable(&mut self, limit: usize) -> Vec<Test> {
        let mut failed = Vec::new();
        while self.running.len() < limit {
            let Some(pos) = self.queue.iter().position(|job| self.is_runnable(job)) else {
                break;
            };
            let Some(mut job) = self.queue.remove(pos) else {
                break;
            };

            for lock in job.locks() {
                debug!(lock = %lock, file = %job.test().file().display(), "lock acquired");
                self.held_locks.insert(lock.clone());
            }
            match job.run(RunMode::Async).await {
                Ok(()) => self.running.push(job),
                Err(e) => {
                    self.release(&job);
                    failed.push(job.test().with_result(TestResult::Failed, format!("{e:#}")));
                }
            }
        }
        failed
    }

    /// Polls every running job once and removes the finished ones, releasing
    /// their locks. Jobs that can no longer be polled come back as failed
    /// variants.
    async fn collect_finished(&mut self) -> (Vec<Job>, Vec<Test>) {
        let mut finished = Vec::new();
        let mut broken = Vec::new();
        let mut i = 0;
        while i < self.running.len() {
            match self.running[i].poll().await {
                Ok(true) => i += 1,
                Ok(false) => {
                    let job = self.running.remove(i);
                    self.release(&job);
                    finished.push(job);
                }
                Err(e) => {
                    // Dropping the job kills the child.
                    let job = self.running.remove(i);
                    self.release(&job);
                    broken.push(job.test().with_result(TestResult::Failed, format!("{e:#}")));
                }
            }
        }
        (finished, broken)
    }

    fn release(&mut self, job: &Job) {
        for lock in job.locks() {
            if self.held_locks.remove(lock) {
                debug!(lock = %lock, file = %job.test().file().display(), "lock released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with(result: TestResult) -> Test {
        Test::new("a.phpt", "a").with_result(result, "")
    }

    #[test]
    fn summary_counts_errors_among_failures() {
        let mut summary = RunSummary::default();
        summary.record(test_with(TestResult::Passed), Some(0));
        summary.record(test_with(TestResult::Skipped), None);
        summary.record(test_with(TestResult::Failed), Some(1));
        assert_eq!((summary.passed, summary.skipped, summary.failed, summary.errors), (1, 1, 1, 0));
        assert!(!summary.is_success());

        let mut crashed = RunSummary::default();
        crashed.record(test_with(TestResult::Failed), Some(CODE_ERROR));
        assert_eq!(crashed.errors, 1);
        assert_eq!(crashed.total(), 1);
    }

    #[test]
    fn empty_summary_is_success() {
        assert!(RunSummary::default().is_success());
    }

    #[test]
    fn zero_jobs_means_one() {
        let interpreter = crate::infra::interpreter::CommandInterpreter::new("sh", vec![], "1.0");
        let runner = Runner::new(TestHandler::new(Box::new(interpreter)), 0);
        assert_eq!(runner.jobs(), 1);
    }
}
