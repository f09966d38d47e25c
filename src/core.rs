//! # Core Module / 核心模块
//!
//! This module contains the engine: the `Test` value type, annotation
//! parsing, process jobs, the annotation handler, the scheduler, plus the
//! configuration and discovery that feed it.
//!
//! 此模块包含执行引擎：`Test` 值类型、注解解析、进程任务、注解处理器和调度器，
//! 以及为其提供输入的配置和测试发现。

pub mod annotations;
pub mod config;
pub mod handler;
pub mod job;
pub mod models;
pub mod planner;
pub mod runner;

// Re-exports
pub use handler::TestHandler;
pub use job::{Job, RunMode};
pub use models::{ArgKey, Test, TestResult};
pub use runner::{RunSummary, Runner};
