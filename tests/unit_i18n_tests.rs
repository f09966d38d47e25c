//! # I18n Unit Tests / I18n 单元测试
//!
//! Tests for locale resolution and the consistency of the bundled message
//! catalogs.
//!
//! 语言区域解析以及内置消息目录一致性的测试。

use std::collections::BTreeSet;
use std::path::Path;
use tester_runner::resolve_locale;

/// Collects dotted key paths of a catalog, e.g. `init.success`.
fn catalog_keys(locale: &str) -> BTreeSet<String> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("locales")
        .join(format!("{locale}.toml"));
    let content = std::fs::read_to_string(&path).unwrap();
    let table: toml::Table = toml::from_str(&content).unwrap();

    fn walk(prefix: &str, table: &toml::Table, keys: &mut BTreeSet<String>) {
        for (key, value) in table {
            let full = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                toml::Value::Table(inner) => walk(&full, inner, keys),
                _ => {
                    keys.insert(full);
                }
            }
        }
    }

    let mut keys = BTreeSet::new();
    walk("", &table, &mut keys);
    keys
}

#[cfg(test)]
mod resolve_locale_tests {
    use super::*;

    #[test]
    fn test_exact_locale_is_kept() {
        assert_eq!(resolve_locale("zh-CN"), "zh-CN");
        assert_eq!(resolve_locale("en"), "en");
    }

    /// Language-only and regional variants map onto a bundled catalog.
    /// 仅语言代码或带地区的变体会映射到内置目录。
    #[test]
    fn test_language_part_is_matched() {
        assert_eq!(resolve_locale("zh"), "zh-CN");
        assert_eq!(resolve_locale("zh_CN"), "zh-CN");
        assert_eq!(resolve_locale("en-US"), "en");
    }

    #[test]
    fn test_unknown_locale_falls_back_to_english() {
        assert_eq!(resolve_locale("fr-FR"), "en");
        assert_eq!(resolve_locale(""), "en");
    }
}

/// Every message exists in every catalog.
/// 每条消息在所有目录中都存在。
#[test]
fn test_catalogs_have_the_same_keys() {
    let en = catalog_keys("en");
    let zh = catalog_keys("zh-CN");
    assert!(en.contains("init.success"));
    assert_eq!(en, zh);
}
