//! # Annotations Module / 注解模块
//!
//! Parses the leading metadata block of a test file. The block is the first
//! `/** ... */` comment that starts at the beginning of a line:
//!
//! ```text
//! /**
//!  * TEST: Database migrations are idempotent
//!  * @multiple 3
//!  * @lock db
//!  */
//! ```
//!
//! 解析测试文件开头的元数据块，即第一个位于行首的 `/** ... */` 注释。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

/// Ordered multimap of lower-cased annotation keys, plus the free-text title
/// line that occupies position 0 of the block.
/// 注解的有序多值映射（键已转为小写），以及位于第 0 位的标题行。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    title: Option<String>,
    entries: Vec<(String, String)>,
}

impl Annotations {
    /// Parses the annotation block out of `content`. Content without a block
    /// yields an empty set.
    pub fn parse(content: &str) -> Self {
        let mut annotations = Annotations::default();
        let Some(block) = find_block(content) else {
            return annotations;
        };

        for line in block.lines() {
            let line = line.trim_start().trim_start_matches('*').trim();
            if let Some(rest) = line.strip_prefix('@') {
                // The key ends at the first non-word char, so `@dataProvider? x` reads as
                // key `dataprovider`, value `? x`.
                let end = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
                    .unwrap_or(rest.len());
                let (key, value) = (&rest[..end], rest[end..].trim());
                if !key.is_empty() {
                    annotations
                        .entries
                        .push((key.to_lowercase(), value.to_string()));
                }
            } else if !line.is_empty()
                && annotations.title.is_none()
                && annotations.entries.is_empty()
            {
                annotations.title = Some(line.to_string());
            }
        }
        annotations
    }

    /// Reads and parses the annotation block of `file`.
    pub fn from_file(file: &Path) -> Result<Self> {
        let content = fs::read(file)
            .with_context(|| format!("Failed to read test file '{}'", file.display()))?;
        Ok(Self::parse(&String::from_utf8_lossy(&content)))
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// All values of `key` in source order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Adds `value` under `key` only when the key is absent, mirroring a
    /// default that the file may override.
    /// 仅当键不存在时添加默认值，文件中的同名注解优先。
    pub fn with_default(mut self, key: &str, value: impl Into<String>) -> Self {
        if !self.contains(key) {
            self.entries.push((key.to_string(), value.into()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display title of a test file: the block title without a leading
    /// `TEST:` marker, then ` | `, then the last three path components.
    ///
    /// 测试文件的显示标题：去掉 `TEST:` 前缀的标题，加上 ` | ` 和路径最后三段。
    pub fn display_title(&self, file: &Path) -> String {
        let tail = path_tail(file, 3);
        match self.title() {
            Some(title) => format!("{} | {}", strip_test_marker(title), tail),
            None => tail,
        }
    }
}

fn find_block(content: &str) -> Option<&str> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.starts_with("/**") {
            let body = &content[offset + 3..];
            let end = body.find("*/")?;
            return Some(&body[..end]);
        }
        offset += line.len();
    }
    None
}

fn strip_test_marker(title: &str) -> &str {
    let trimmed = title.trim_start();
    match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("test:") => trimmed[5..].trim_start(),
        _ => title,
    }
}

fn path_tail(file: &Path, count: usize) -> String {
    let parts: Vec<_> = file
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    let start = parts.len().saturating_sub(count);
    parts[start..].join(std::path::MAIN_SEPARATOR_STR)
}
