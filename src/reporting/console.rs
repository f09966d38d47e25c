//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the progress of a run and its final summary in the
//! console, with colored statuses and internationalized messages.
//!
//! 此模块在控制台打印运行进度和最终摘要，带有彩色状态和国际化消息。

use colored::*;
use std::time::Duration;

use crate::core::models::{Test, TestResult};
use crate::core::runner::RunSummary;
use crate::infra::t;

/// Receives verdicts from the runner as they become available.
/// 在结论产生时接收来自调度器的结果。
pub trait Reporter {
    /// Called once before any test file is expanded.
    fn begin(&mut self, _files: usize, _jobs: usize) {}

    /// Called for every variant once it has a verdict. `duration` is `None`
    /// for variants that never ran a process.
    /// 每个变体得出结论时调用。未运行进程的变体 `duration` 为 `None`。
    fn report(&mut self, test: &Test, duration: Option<Duration>);

    /// Called once after the last verdict.
    fn end(&mut self, _summary: &RunSummary) {}
}

/// Reporter printing one line per variant and a summary at the end.
/// 每个变体打印一行并在结束时打印摘要的报告器。
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    locale: String,
    show_skipped: bool,
}

impl ConsoleReporter {
    pub fn new(locale: impl Into<String>, show_skipped: bool) -> Self {
        Self {
            locale: locale.into(),
            show_skipped,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn begin(&mut self, files: usize, jobs: usize) {
        println!(
            "{}",
            t!("running_tests", locale = &self.locale, files = files, jobs = jobs).bold()
        );
    }

    fn report(&mut self, test: &Test, duration: Option<Duration>) {
        let status = status_label(test.result(), &self.locale);
        let duration_str = duration
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());
        println!("  - {:<10} | {:>10} | {}", status, duration_str, test.signature());
    }

    fn end(&mut self, summary: &RunSummary) {
        print_summary(summary, &self.locale, self.show_skipped);
    }
}

fn status_label(result: TestResult, locale: &str) -> ColoredString {
    match result {
        TestResult::Passed => t!("status_passed", locale = locale).green(),
        TestResult::Skipped => t!("status_skipped", locale = locale).yellow(),
        TestResult::Failed => t!("status_failed", locale = locale).red(),
        TestResult::Unresolved => t!("status_unresolved", locale = locale).dimmed(),
    }
}

/// Prints the final report: failure details, optionally the skip reasons,
/// then the per-outcome counts and the elapsed time.
///
/// 打印最终报告：失败详情、可选的跳过原因，以及各结果的数量和耗时。
///
/// # Output Format / 输出格式
/// ```text
/// --- Summary ---
/// Passed: 12, Skipped: 1, Failed: 2 (1 crashed), Total: 15
/// Time: 1.84s
/// ```
pub fn print_summary(summary: &RunSummary, locale: &str, show_skipped: bool) {
    let failures: Vec<&Test> = summary
        .results
        .iter()
        .filter(|test| test.result() == TestResult::Failed)
        .collect();
    print_failure_details(&failures, locale);

    if show_skipped {
        let skipped: Vec<&Test> = summary
            .results
            .iter()
            .filter(|test| test.result() == TestResult::Skipped)
            .collect();
        print_skipped(&skipped, locale);
    }

    println!("\n{}", t!("summary_banner", locale = locale).bold());
    let mut counts = format!(
        "{}: {}, {}: {}, {}: {}",
        t!("status_passed", locale = locale),
        summary.passed.to_string().green(),
        t!("status_skipped", locale = locale),
        summary.skipped.to_string().yellow(),
        t!("status_failed", locale = locale),
        summary.failed.to_string().red(),
    );
    if summary.errors > 0 {
        counts.push_str(&format!(
            " ({})",
            t!("crashed_count", locale = locale, count = summary.errors)
        ));
    }
    counts.push_str(&format!(
        ", {}: {}",
        t!("total", locale = locale),
        summary.total()
    ));
    println!("{counts}");
    println!(
        "{}",
        t!("elapsed_time", locale = locale, time = format!("{:.2?}", summary.duration)).cyan()
    );

    if summary.is_success() {
        println!("\n{}", t!("all_tests_passed", locale = locale).green().bold());
    } else {
        println!("\n{}", t!("tests_failed", locale = locale).red().bold());
    }
}

/// Prints the message and captured stderr of every failed variant.
/// 打印每个失败变体的消息和捕获的 stderr。
pub fn print_failure_details(failures: &[&Test], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, test) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            t!("report_header_failure", locale = locale).red(),
            test.signature().cyan()
        );
        println!("{}", test.file().display().to_string().dimmed());
        if !test.message().is_empty() {
            println!("\n{}", test.message());
        }
        if !test.stderr().trim().is_empty() {
            println!("\n--- {} ---\n", t!("stderr_log", locale = locale).yellow());
            println!("{}", test.stderr().trim_end());
        }
        println!("\n{}", "-".repeat(80));
    }
}

fn print_skipped(skipped: &[&Test], locale: &str) {
    if skipped.is_empty() {
        return;
    }

    println!("\n{}", t!("skipped_banner", locale = locale).yellow().bold());
    for test in skipped {
        let reason = if test.message().is_empty() {
            t!("no_reason", locale = locale).to_string()
        } else {
            test.message().to_string()
        };
        println!("  - {} ({})", test.signature(), reason.dimmed());
    }
}
