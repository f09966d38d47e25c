//! # Tester Runner Library / Tester Runner 库
//!
//! This library provides the core functionality of Tester Runner, a test
//! harness orchestrator. It discovers test programs, expands each one into
//! concrete variants from the annotations in its leading comment block, runs
//! them as child processes under a parallelism and lock budget, and
//! classifies every outcome as passed, skipped or failed.
//!
//! 此库为 Tester Runner 提供核心功能。它是一个测试编排器：发现测试程序，根据文件开头注释块中的注解
//! 将每个程序展开为具体变体，在并行度和锁的约束下以子进程方式运行它们，并将结果分类为通过、跳过或失败。
//!
//! ## Modules / 模块
//!
//! - `core` - Test model, annotation handler, process jobs and the scheduler
//! - `infra` - Interpreter, output matcher, data sources, diagnostics and command helpers
//! - `reporting` - Console progress and summary output
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 测试模型、注解处理器、进程任务和调度器
//! - `infra` - 解释器、输出匹配、数据源、诊断产物和命令辅助工具
//! - `reporting` - 控制台进度和摘要输出
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::models;
pub use core::{Runner, TestHandler};

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    rust_i18n::set_locale(resolve_locale(&locale));
}

/// Maps a requested locale onto one of the bundled catalogs.
/// 将请求的语言区域映射到内置的消息目录之一。
pub fn resolve_locale(requested: &str) -> &'static str {
    let available_locales = rust_i18n::available_locales!();

    // Full locale first (e.g. "zh-CN"), then the language part (e.g. "en" from "en-US").
    available_locales
        .iter()
        .copied()
        .find(|locale| locale.eq_ignore_ascii_case(requested))
        .or_else(|| {
            let lang = requested.split(['-', '_']).next().unwrap_or(requested);
            if lang.is_empty() {
                return None;
            }
            available_locales
                .iter()
                .copied()
                .find(|locale| locale.eq_ignore_ascii_case(lang) || locale.starts_with(lang))
        })
        .unwrap_or("en")
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
