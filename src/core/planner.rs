//! # Test Discovery Planner Module / 测试发现计划模块
//!
//! Turns the configured roots into the ordered list of test files handed to
//! the runner. A root that is a file is taken as is; a directory is walked
//! recursively in name order and filtered by the file name patterns.
//!
//! 将配置的根路径转换为交给调度器的有序测试文件列表。文件根路径原样使用；
//! 目录根路径按名称顺序递归遍历，并按文件名模式过滤。

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::infra::fs::collect_files;

/// Represents the files selected for one run.
/// 表示一次运行所选中的文件。
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    /// Test files in discovery order, without duplicates.
    /// 按发现顺序排列且无重复的测试文件。
    pub files: Vec<PathBuf>,
    /// Number of files found more than once through overlapping roots.
    /// 由于根路径重叠而被重复发现的文件数量。
    pub duplicate_count: usize,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Creates an execution plan from `roots`.
///
/// # Arguments
/// * `roots` - Files or directories to search
/// * `patterns` - File name globs a discovered file must match
///
/// # Returns
/// An `ExecutionPlan`, or an error naming the first root that does not exist
/// or the first pattern that is not a valid glob
pub fn plan_execution(roots: &[PathBuf], patterns: &[String]) -> Result<ExecutionPlan> {
    let globs = build_patterns(patterns)?;
    let accept = |name: &str| globs.is_match(name);

    let mut plan = ExecutionPlan::default();
    let mut seen = HashSet::new();
    for root in roots {
        let found = if root.is_file() {
            vec![root.clone()]
        } else if root.is_dir() {
            collect_files(root, &accept)?
        } else {
            bail!("Test path '{}' does not exist", root.display());
        };

        for file in found {
            if seen.insert(normalize(&file)) {
                plan.files.push(file);
            } else {
                plan.duplicate_count += 1;
            }
        }
    }
    Ok(plan)
}

/// Compiles the file name patterns into one glob set.
/// 将文件名模式编译为一个 glob 集合。
pub fn build_patterns(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid test file pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("Failed to compile test file patterns")
}

fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
