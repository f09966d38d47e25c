//! # Infrastructure Module / 基础设施模块
//!
//! This module provides the collaborators the engine consumes: the
//! interpreter description, output matching, data sources, diagnostics
//! persistence and one-shot command execution.
//!
//! 此模块提供引擎使用的协作组件：解释器描述、输出匹配、数据源、诊断产物持久化和一次性命令执行。

pub mod command;
pub mod data_provider;
pub mod fs;
pub mod interpreter;
pub mod matcher;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
