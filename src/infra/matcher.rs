//! # Output Matcher Module / 输出匹配模块
//!
//! Compares captured output against an expected pattern that may contain
//! `%token%` wildcards.
//!
//! | Token  | Matches                                  |
//! |--------|------------------------------------------|
//! | `%a%`  | one or more characters except newline    |
//! | `%A%`  | one or more characters including newline |
//! | `%s%`  | zero or more spaces or tabs              |
//! | `%S%`  | zero or more characters except newline   |
//! | `%w%`  | zero or more word characters             |
//! | `%i%`  | signed integer                           |
//! | `%d%`  | one or more digits                       |
//! | `%h%`  | one or more hexadecimal digits           |
//! | `%f%`  | floating point number                    |
//! | `%c%`  | exactly one character except newline     |
//! | `%ds%` | `/` or `\`                               |
//! | `%%`   | a literal `%`                            |
//!
//! 将捕获的输出与可能包含 `%token%` 通配符的期望模式进行比较。

use regex::Regex;
use tracing::warn;

/// Output matching capability used by the `outputmatch` assessment.
pub trait Matcher: Send + Sync {
    fn is_matching(&self, pattern: &str, actual: &str) -> bool;

    /// Rewrites both sides so a diff between them highlights only the parts
    /// that really differ.
    fn expand_matching_patterns(&self, pattern: &str, actual: &str) -> (String, String);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardMatcher;

impl Matcher for WildcardMatcher {
    fn is_matching(&self, pattern: &str, actual: &str) -> bool {
        let source = to_regex(&normalize(pattern));
        match Regex::new(&source) {
            Ok(regex) => regex.is_match(&normalize(actual)),
            Err(e) => {
                warn!("Cannot compile output pattern: {e}");
                false
            }
        }
    }

    fn expand_matching_patterns(&self, pattern: &str, actual: &str) -> (String, String) {
        let pattern = normalize(pattern);
        let actual = normalize(actual);
        let actual_lines: Vec<&str> = actual.lines().collect();

        let expanded = pattern
            .lines()
            .enumerate()
            .map(|(i, line)| match actual_lines.get(i) {
                Some(actual_line) if self.is_matching(line, actual_line) => *actual_line,
                _ => line,
            })
            .collect::<Vec<_>>()
            .join("\n");
        (expanded, actual)
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Regex fragment of a `%name%` token. `None` for unknown names, which stay
/// literal text.
fn token_fragment(name: &str) -> Option<&'static str> {
    let fragment = match name {
        "" => "%",
        "a" => r"[^\r\n]+",
        "A" => r"(?s:.+)",
        "s" => r"[\t ]*",
        "S" => r"[^\r\n]*",
        "w" => r"\w*",
        "i" => r"[+-]?\d+",
        "d" => r"\d+",
        "h" => r"[0-9a-fA-F]+",
        "f" => r"[+-]?\.?\d+\.?\d*(?:[Ee][+-]?\d+)?",
        "c" => r"[^\r\n]",
        "ds" => r"[/\\]",
        _ => return None,
    };
    Some(fragment)
}

/// Translates a `%token%` pattern into an anchored regex source. Literal
/// text is escaped.
fn to_regex(pattern: &str) -> String {
    let mut source = String::from(r"\A");
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(start) = rest.find('%') {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let token = after
            .find('%')
            .and_then(|end| token_fragment(&after[..end]).map(|fragment| (fragment, &after[end + 1..])));
        match token {
            Some((fragment, tail)) => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(fragment);
                rest = tail;
            }
            None => {
                literal.push('%');
                rest = after;
            }
        }
    }
    literal.push_str(rest);
    source.push_str(&regex::escape(&literal));
    source.push_str(r"\z");
    source
}
