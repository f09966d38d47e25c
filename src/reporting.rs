//! # Reporting Module / 报告模块
//!
//! This module prints test progress and the final summary to the console
//! with internationalization support.
//!
//! 此模块在控制台打印测试进度和最终摘要，支持国际化。

pub mod console;

// Re-export common reporting functions
pub use console::{ConsoleReporter, Reporter, print_failure_details, print_summary};
