//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides the file system services the engine relies on:
//! persisting diagnostic artifacts next to failed tests and walking
//! directories for test files.
//!
//! 此模块提供引擎依赖的文件系统服务：在失败测试旁保存诊断产物，以及遍历目录查找测试文件。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Persists artifacts that help to inspect a failure after the run.
/// 保存用于运行结束后检查失败原因的产物。
pub trait DiagnosticsWriter: Send + Sync {
    /// Saves `content` as a sibling artifact of `test_file` named by `suffix`
    /// (for example `.actual`) and returns the written path.
    fn save_output(&self, test_file: &Path, content: &str, suffix: &str) -> Result<PathBuf>;
}

/// Writes artifacts into a directory next to the test file:
/// `<test dir>/<dir name>/<file stem><suffix>`.
#[derive(Debug, Clone)]
pub struct OutputDirWriter {
    dir_name: PathBuf,
}

impl OutputDirWriter {
    pub fn new(dir_name: impl Into<PathBuf>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    /// Path an artifact for `test_file` with `suffix` would be written to.
    pub fn artifact_path(&self, test_file: &Path, suffix: &str) -> PathBuf {
        let parent = test_file.parent().unwrap_or_else(|| Path::new("."));
        let stem = test_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        parent.join(&self.dir_name).join(format!("{stem}{suffix}"))
    }
}

impl Default for OutputDirWriter {
    fn default() -> Self {
        Self::new("output")
    }
}

impl DiagnosticsWriter for OutputDirWriter {
    fn save_output(&self, test_file: &Path, content: &str, suffix: &str) -> Result<PathBuf> {
        let path = self.artifact_path(test_file, suffix);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create diagnostics directory: {}", dir.display())
            })?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write diagnostics file: {}", path.display()))?;
        Ok(path)
    }
}

/// Recursively collects files under `dir` whose name is accepted by
/// `accept`. Entries are visited in name order so the result is stable
/// across runs and platforms.
///
/// 递归收集 `dir` 下名称被 `accept` 接受的文件。按名称顺序遍历，使结果在不同运行和平台间保持稳定。
pub fn collect_files(dir: &Path, accept: &dyn Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if entry.file_type().is_file() && entry.file_name().to_str().is_some_and(accept) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
