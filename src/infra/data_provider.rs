//! # Data Provider Module / 数据源模块
//!
//! Loads the rows behind a `@dataprovider` annotation. A locator has the form
//! `[?]<file>[, <selector>]`: a leading `?` marks the source optional, the
//! file is resolved against the test file's directory, and the selector is a
//! comma-separated list of `field <op> value` conditions every row must meet.
//!
//! Sources are `.toml` or `.json` documents whose top level is a table of
//! tables. Each top-level key is one row.
//!
//! 加载 `@dataprovider` 注解引用的数据行。定位符格式为 `[?]<文件>[, <选择器>]`。

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::infra::interpreter::compare_versions;

/// A parsed `@dataprovider` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub file: PathBuf,
    pub selector: Option<String>,
    pub optional: bool,
}

/// Ordered rows of a data source, keyed by row name.
pub type Rows = Vec<(String, Value)>;

pub trait DataLoader: Send + Sync {
    fn resolve_locator(&self, locator: &str, test_file: &Path) -> Result<DataSource>;

    /// Loads the rows that pass the selector. An empty result is an error.
    fn load(&self, file: &Path, selector: Option<&str>) -> Result<Rows>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileDataLoader;

impl DataLoader for FileDataLoader {
    fn resolve_locator(&self, locator: &str, test_file: &Path) -> Result<DataSource> {
        let locator = locator.trim();
        let (optional, locator) = match locator.strip_prefix('?') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, locator),
        };
        let (file, selector) = match locator.split_once(',') {
            Some((file, selector)) => (file.trim(), Some(selector.trim().to_string())),
            None => (locator, None),
        };
        if file.is_empty() {
            bail!(
                "Missing data source file in annotation of '{}'",
                test_file.display()
            );
        }

        let base = test_file.parent().unwrap_or_else(|| Path::new("."));
        Ok(DataSource {
            file: base.join(file),
            selector: selector.filter(|s| !s.is_empty()),
            optional,
        })
    }

    fn load(&self, file: &Path, selector: Option<&str>) -> Result<Rows> {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Missing data source file '{}'", file.display()))?;

        let document: Value = match file.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Cannot parse data source '{}'", file.display()))?,
            Some("toml") => {
                let table: toml::Table = toml::from_str(&content)
                    .with_context(|| format!("Cannot parse data source '{}'", file.display()))?;
                serde_json::to_value(table)?
            }
            _ => bail!(
                "Unsupported data source '{}', expected a .toml or .json file",
                file.display()
            ),
        };

        let Value::Object(rows) = document else {
            bail!("Data source '{}' must contain a table of rows", file.display());
        };

        let conditions = selector.map(parse_selector).transpose()?.unwrap_or_default();
        let rows: Rows = rows
            .into_iter()
            .filter(|(_, row)| conditions.iter().all(|c| c.accepts(row)))
            .collect();

        if rows.is_empty() {
            match selector {
                Some(selector) => bail!(
                    "No records in data source '{}' for selector '{}'",
                    file.display(),
                    selector
                ),
                None => bail!("No records in data source '{}'", file.display()),
            }
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    field: String,
    op: String,
    value: String,
}

impl Condition {
    fn accepts(&self, row: &Value) -> bool {
        let Some(actual) = row.get(&self.field) else {
            return false;
        };
        let actual = match actual {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let ordering = match (actual.parse::<f64>(), self.value.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(compare_versions(&actual, &self.value)),
        };
        let Some(ordering) = ordering else {
            return false;
        };
        match self.op.as_str() {
            "=" | "==" => ordering == Ordering::Equal,
            "!=" | "<>" => ordering != Ordering::Equal,
            "<" => ordering == Ordering::Less,
            "<=" => ordering != Ordering::Greater,
            ">" => ordering == Ordering::Greater,
            ">=" => ordering != Ordering::Less,
            _ => false,
        }
    }
}

const OPERATORS: [&str; 8] = ["<=", ">=", "==", "!=", "<>", "<", ">", "="];

fn parse_selector(selector: &str) -> Result<Vec<Condition>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (pos, op) = part
                .char_indices()
                .find_map(|(i, _)| {
                    OPERATORS
                        .iter()
                        .find(|op| part[i..].starts_with(**op))
                        .map(|op| (i, *op))
                })
                .with_context(|| format!("Invalid data source condition '{part}'"))?;
            let field = part[..pos].trim();
            if field.is_empty() {
                bail!("Invalid data source condition '{part}'");
            }
            Ok(Condition {
                field: field.to_string(),
                op: op.to_string(),
                value: part[pos + op.len()..].trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selector_splits_field_operator_value() {
        let conditions = parse_selector("driver = mysql, version>=5.7").unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].field, "version");
        assert_eq!(conditions[1].op, ">=");
        assert_eq!(conditions[1].value, "5.7");
    }

    #[test]
    fn condition_compares_numbers_numerically() {
        let condition = &parse_selector("port > 9").unwrap()[0];
        assert!(condition.accepts(&json!({ "port": 10 })));
        assert!(!condition.accepts(&json!({ "port": "8" })));
        assert!(!condition.accepts(&json!({ "host": "x" })));
    }

    #[test]
    fn selector_without_operator_is_rejected() {
        assert!(parse_selector("driver").is_err());
    }
}
