//! # Test Handler Module / 测试处理器模块
//!
//! The handler turns annotations into behavior in two phases:
//!
//! - `initiate` expands one test file into `Test` variants before anything
//!   runs. Each recognized annotation may leave a variant alone, resolve it,
//!   or replace it with derived variants.
//! - `assess` turns a finished `Job` into its final verdict.
//!
//! Handlers are looked up in the static tables [`INITIATE_HANDLERS`] and
//! [`ASSESS_HANDLERS`] and always run in table order, whatever order the
//! annotations appear in the file.
//!
//! 处理器分两个阶段把注解转换为行为：`initiate` 在运行前将测试文件展开为多个变体，
//! `assess` 将完成的任务转换为最终结论。处理器始终按静态表顺序执行，与注解在文件中的顺序无关。

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::core::annotations::Annotations;
use crate::core::job::{CODE_FAIL, CODE_OK, CODE_SKIP, Job, RunMode};
use crate::core::models::{ArgKey, Test, TestResult};
use crate::infra::data_provider::{DataLoader, FileDataLoader};
use crate::infra::fs::{DiagnosticsWriter, OutputDirWriter};
use crate::infra::interpreter::{Interpreter, compare_versions};
use crate::infra::matcher::{Matcher, WildcardMatcher};

pub const HTTP_OK: i32 = 200;

/// Reserved `--method` value asking a test case file to print its test
/// methods instead of running them.
/// 保留的 `--method` 值，要求测试用例文件打印其测试方法而不是运行它们。
pub const LIST_METHODS: &str = "tester-list-methods";

/// Handlers applied while expanding a file into variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiateHandler {
    Skip,
    Version,
    Ini,
    DataProvider,
    Multiple,
    TestCase,
    Lock,
}

/// Handlers applied to a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessHandler {
    ExitCode,
    HttpCode,
    OutputMatchFile,
    OutputMatch,
}

/// Annotation keys and their initiate handlers, in application order.
/// 注解键及其 initiate 处理器，按应用顺序排列。
pub const INITIATE_HANDLERS: [(&str, InitiateHandler); 8] = [
    ("skip", InitiateHandler::Skip),
    ("phpversion", InitiateHandler::Version),
    ("ini", InitiateHandler::Ini),
    ("phpini", InitiateHandler::Ini),
    ("dataprovider", InitiateHandler::DataProvider),
    ("multiple", InitiateHandler::Multiple),
    ("testcase", InitiateHandler::TestCase),
    ("lock", InitiateHandler::Lock),
];

/// Annotation keys and their assess handlers, in application order.
/// 注解键及其 assess 处理器，按应用顺序排列。
pub const ASSESS_HANDLERS: [(&str, AssessHandler); 4] = [
    ("exitcode", AssessHandler::ExitCode),
    ("httpcode", AssessHandler::HttpCode),
    ("outputmatchfile", AssessHandler::OutputMatchFile),
    ("outputmatch", AssessHandler::OutputMatch),
];

/// What an initiate handler did with one variant.
#[derive(Debug)]
enum Expansion {
    Keep,
    Replace(Vec<Test>),
}

impl Expansion {
    fn resolve(test: &Test, result: TestResult, message: impl Into<String>) -> Self {
        Expansion::Replace(vec![test.with_result(result, message)])
    }
}

/// State of one file that initiate handlers may change: the file's private
/// interpreter copy and its lock requirements.
struct FileContext {
    interpreter: Box<dyn Interpreter>,
    locks: Vec<String>,
}

/// Outcome of expanding one file.
/// 展开单个文件的结果。
#[derive(Debug)]
pub struct Initiation {
    /// Every variant, resolved or not, in expansion order.
    pub tests: Vec<Test>,
    /// One job per variant still unresolved.
    pub jobs: Vec<Job>,
}

impl Initiation {
    /// Variants that already carry a verdict and will not run.
    pub fn resolved(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter().filter(|test| test.has_result())
    }
}

/// Default test behavior driven by annotations.
/// 由注解驱动的默认测试行为。
pub struct TestHandler {
    interpreter: Box<dyn Interpreter>,
    env_vars: BTreeMap<String, String>,
    matcher: Box<dyn Matcher>,
    diagnostics: Box<dyn DiagnosticsWriter>,
    data_loader: Box<dyn DataLoader>,
    annotations: Mutex<HashMap<PathBuf, Arc<Annotations>>>,
}

impl TestHandler {
    pub fn new(interpreter: Box<dyn Interpreter>) -> Self {
        Self {
            interpreter,
            env_vars: BTreeMap::new(),
            matcher: Box::new(WildcardMatcher),
            diagnostics: Box::new(OutputDirWriter::default()),
            data_loader: Box::new(FileDataLoader),
            annotations: Mutex::new(HashMap::new()),
        }
    }

    /// Environment overrides handed to every spawned test process.
    pub fn with_env_vars(mut self, env_vars: BTreeMap<String, String>) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Box<dyn DiagnosticsWriter>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_data_loader(mut self, data_loader: Box<dyn DataLoader>) -> Self {
        self.data_loader = data_loader;
        self
    }

    pub fn interpreter(&self) -> &dyn Interpreter {
        self.interpreter.as_ref()
    }

    /// Expands `file` into test variants and creates a job for every variant
    /// that is still unresolved afterwards. Problems with the file itself
    /// resolve the variant as failed instead of returning an error.
    ///
    /// 将 `file` 展开为测试变体，并为每个仍未决的变体创建任务。
    /// 文件本身的问题会将变体标记为失败，而不是返回错误。
    pub async fn initiate(&self, file: &Path) -> Initiation {
        let annotations = match self.annotations_of(file) {
            Ok(annotations) => annotations,
            Err(e) => {
                let test = Test::new(file, Annotations::default().display_title(file));
                return Initiation {
                    tests: vec![test.with_result(TestResult::Failed, format!("{e:#}"))],
                    jobs: Vec::new(),
                };
            }
        };

        let mut ctx = FileContext {
            interpreter: self.interpreter.clone(),
            locks: Vec::new(),
        };
        let mut tests = vec![Test::new(file, annotations.display_title(file))];

        for (key, handler) in INITIATE_HANDLERS {
            for value in annotations.values(key) {
                let mut expanded = Vec::with_capacity(tests.len());
                for test in tests {
                    if test.has_result() {
                        expanded.push(test);
                        continue;
                    }
                    match self.apply_initiate(handler, &test, value, &mut ctx).await {
                        Expansion::Keep => expanded.push(test),
                        Expansion::Replace(variants) => expanded.extend(variants),
                    }
                }
                tests = expanded;
            }
        }

        let jobs = tests
            .iter()
            .filter(|test| !test.has_result())
            .map(|test| {
                Job::new(test.clone(), ctx.interpreter.clone(), self.env_vars.clone())
                    .with_locks(ctx.locks.clone())
            })
            .collect::<Vec<_>>();
        debug!(
            file = %file.display(),
            variants = tests.len(),
            jobs = jobs.len(),
            "test file initiated"
        );
        Initiation { tests, jobs }
    }

    /// Turns a finished job into the final verdict of its test variant. The
    /// first handler that resolves the variant wins; otherwise it passes.
    ///
    /// 将完成的任务转换为其测试变体的最终结论。第一个给出结论的处理器生效，否则视为通过。
    pub fn assess(&self, job: &Job) -> Test {
        let test = job.test();
        let annotations = match self.annotations_of(test.file()) {
            Ok(annotations) => annotations,
            Err(e) => return test.with_result(TestResult::Failed, format!("{e:#}")),
        };
        let annotations = Annotations::clone(&annotations)
            .with_default("exitcode", CODE_OK.to_string())
            .with_default("httpcode", HTTP_OK.to_string());

        for (key, handler) in ASSESS_HANDLERS {
            for value in annotations.values(key) {
                if let Some(resolved) = self.apply_assess(handler, job, value) {
                    return resolved;
                }
            }
        }
        test.with_result(TestResult::Passed, test.message())
    }

    fn annotations_of(&self, file: &Path) -> Result<Arc<Annotations>> {
        let mut cache = self
            .annotations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(annotations) = cache.get(file) {
            return Ok(Arc::clone(annotations));
        }
        let annotations = Arc::new(Annotations::from_file(file)?);
        cache.insert(file.to_path_buf(), Arc::clone(&annotations));
        Ok(annotations)
    }

    async fn apply_initiate(
        &self,
        handler: InitiateHandler,
        test: &Test,
        value: &str,
        ctx: &mut FileContext,
    ) -> Expansion {
        match handler {
            InitiateHandler::Skip => Expansion::resolve(test, TestResult::Skipped, value),
            InitiateHandler::Version => initiate_version(test, value, ctx.interpreter.as_ref()),
            InitiateHandler::Ini => {
                // Runs before any fan-out handler, so exactly one variant gets here.
                let (key, option) = match value.split_once('=') {
                    Some((key, option)) => (key.trim(), Some(option.trim())),
                    None => (value.trim(), None),
                };
                ctx.interpreter.add_startup_option(key, option);
                Expansion::Keep
            }
            InitiateHandler::DataProvider => self.initiate_data_provider(test, value),
            InitiateHandler::Multiple => initiate_multiple(test, value),
            InitiateHandler::TestCase => self.initiate_test_case(test, ctx).await,
            InitiateHandler::Lock => {
                let name = value.trim();
                if name.is_empty() {
                    return Expansion::resolve(
                        test,
                        TestResult::Failed,
                        format!("Missing @lock name in file '{}'.", test.file().display()),
                    );
                }
                if !ctx.locks.iter().any(|lock| lock == name) {
                    ctx.locks.push(name.to_string());
                }
                Expansion::Keep
            }
        }
    }

    fn initiate_data_provider(&self, test: &Test, locator: &str) -> Expansion {
        let source = match self.data_loader.resolve_locator(locator, test.file()) {
            Ok(source) => source,
            Err(e) => return Expansion::resolve(test, TestResult::Failed, format!("{e:#}")),
        };

        let failure = if source.optional {
            TestResult::Skipped
        } else {
            TestResult::Failed
        };
        match self
            .data_loader
            .load(&source.file, source.selector.as_deref())
        {
            Ok(rows) if rows.is_empty() => Expansion::resolve(
                test,
                failure,
                format!("No records in data source '{}'", source.file.display()),
            ),
            Ok(rows) => Expansion::Replace(
                rows.into_iter()
                    .map(|(key, _)| {
                        test.with_arguments([(
                            ArgKey::Positional,
                            format!("{}|{}", key, source.file.display()),
                        )])
                    })
                    .collect(),
            ),
            Err(e) => Expansion::resolve(test, failure, format!("{e:#}")),
        }
    }

    /// Runs the file once with `--method=<LIST_METHODS>` and fans out one
    /// variant per reported method.
    async fn initiate_test_case(&self, test: &Test, ctx: &FileContext) -> Expansion {
        let probe_test = test.with_arguments([(ArgKey::named("method"), LIST_METHODS)]);
        let mut probe = Job::new(probe_test, ctx.interpreter.clone(), self.env_vars.clone());
        if let Err(e) = probe.run(RunMode::Sync).await {
            return Expansion::resolve(test, TestResult::Failed, format!("{e:#}"));
        }

        let output = probe.test().stdout();
        match probe.exit_code() {
            CODE_OK => {}
            CODE_SKIP => return Expansion::resolve(test, TestResult::Skipped, output.trim()),
            _ => return Expansion::resolve(test, TestResult::Failed, output.trim()),
        }

        match parse_method_list(output) {
            None => Expansion::resolve(
                test,
                TestResult::Failed,
                format!(
                    "Cannot list test case methods in file '{}'. Does it print them as [a,b,...] when run with --method={}?",
                    test.file().display(),
                    LIST_METHODS
                ),
            ),
            Some(methods) if methods.is_empty() => Expansion::resolve(
                test,
                TestResult::Skipped,
                format!(
                    "Test case in file '{}' does not contain test methods.",
                    test.file().display()
                ),
            ),
            Some(methods) => Expansion::Replace(
                methods
                    .into_iter()
                    .map(|method| test.with_arguments([(ArgKey::named("method"), method)]))
                    .collect(),
            ),
        }
    }

    fn apply_assess(&self, handler: AssessHandler, job: &Job, value: &str) -> Option<Test> {
        match handler {
            AssessHandler::ExitCode => assess_exit_code(job, value),
            AssessHandler::HttpCode => assess_http_code(job, value),
            AssessHandler::OutputMatchFile => {
                let test = job.test();
                let dir = test.file().parent().unwrap_or_else(|| Path::new("."));
                let file = dir.join(value.trim());
                if !file.is_file() {
                    return Some(test.with_result(
                        TestResult::Failed,
                        format!("Missing matching file '{}'.", file.display()),
                    ));
                }
                match fs::read_to_string(&file) {
                    Ok(expected) => self.assess_output_match(job, &expected),
                    Err(e) => Some(test.with_result(
                        TestResult::Failed,
                        format!("Cannot read matching file '{}': {}", file.display(), e),
                    )),
                }
            }
            AssessHandler::OutputMatch => self.assess_output_match(job, value),
        }
    }

    fn assess_output_match(&self, job: &Job, expected: &str) -> Option<Test> {
        let test = job.test();
        let actual = test.stdout();
        if self.matcher.is_matching(expected, actual) {
            return None;
        }

        let (expected, actual) = self.matcher.expand_matching_patterns(expected, actual);
        for (content, suffix) in [(&actual, ".actual"), (&expected, ".expected")] {
            if let Err(e) = self.diagnostics.save_output(test.file(), content, suffix) {
                warn!(file = %test.file().display(), "{e:#}");
            }
        }
        Some(test.with_result(
            TestResult::Failed,
            format!("Failed: output should match {}", to_line(&expected)),
        ))
    }
}

fn initiate_version(test: &Test, constraint: &str, interpreter: &dyn Interpreter) -> Expansion {
    const OPERATORS: [&str; 8] = ["<=", "<>", "<", "==", "=", "!=", ">=", ">"];

    let trimmed = constraint.trim();
    let (op, required) = OPERATORS
        .iter()
        .find_map(|op| trimmed.strip_prefix(op).map(|rest| (*op, rest.trim())))
        .unwrap_or((">=", trimmed));
    if required.is_empty() {
        return Expansion::Keep;
    }

    let ordering = compare_versions(interpreter.version(), required);
    let satisfied = match op {
        "<=" => ordering.is_le(),
        "<" => ordering.is_lt(),
        "==" | "=" => ordering.is_eq(),
        "!=" | "<>" => ordering.is_ne(),
        ">" => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    if satisfied {
        Expansion::Keep
    } else {
        Expansion::resolve(
            test,
            TestResult::Skipped,
            format!("Requires version {trimmed}."),
        )
    }
}

fn initiate_multiple(test: &Test, count: &str) -> Expansion {
    match count.trim().parse::<usize>() {
        Ok(0) => Expansion::resolve(test, TestResult::Skipped, "@multiple 0 leaves no variant to run."),
        Ok(count) => Expansion::Replace(
            (0..count)
                .map(|i| test.with_arguments([(ArgKey::Positional, i.to_string())]))
                .collect(),
        ),
        Err(_) => Expansion::resolve(
            test,
            TestResult::Failed,
            format!("Invalid @multiple count '{}'.", count.trim()),
        ),
    }
}

fn assess_exit_code(job: &Job, value: &str) -> Option<Test> {
    let test = job.test();
    let Ok(expected) = value.trim().parse::<i32>() else {
        return Some(test.with_result(
            TestResult::Failed,
            format!("Invalid @exitcode '{}'.", value.trim()),
        ));
    };

    let actual = job.exit_code();
    let stdout = test.stdout();
    if actual == CODE_SKIP {
        let message = match stdout.rfind("Skipped:") {
            Some(pos) => &stdout[pos + "Skipped:".len()..],
            None => stdout,
        };
        return Some(test.with_result(TestResult::Skipped, message.trim()));
    }

    if actual != expected {
        let message = if actual != CODE_FAIL {
            format!("Exited with error code {actual} (expected {expected})")
        } else {
            String::new()
        };
        return Some(test.with_result(
            TestResult::Failed,
            format!("{message}\n{stdout}").trim(),
        ));
    }
    None
}

fn assess_http_code(job: &Job, value: &str) -> Option<Test> {
    if !job.interpreter().is_gateway() {
        return None;
    }

    let expected = value.trim().parse::<i32>().unwrap_or(0);
    let actual = job
        .header("Status")
        .and_then(leading_number)
        .unwrap_or(HTTP_OK);
    if expected != 0 && expected != actual {
        return Some(job.test().with_result(
            TestResult::Failed,
            format!("Exited with HTTP code {actual} (expected {expected})"),
        ));
    }
    None
}

fn leading_number(text: &str) -> Option<i32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Method names inside the last `[...]` pair of the probe output.
/// `None` when there is no such pair.
/// 探测输出中最后一对方括号内的方法名；不存在时返回 `None`。
pub fn parse_method_list(output: &str) -> Option<Vec<String>> {
    let start = output.rfind('[')?;
    let inner = &output[start + 1..];
    let end = inner.find(']')?;
    Some(
        inner[..end]
            .split(',')
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// One-line rendering of a possibly long, multi-line text.
fn to_line(text: &str) -> String {
    const MAX_CHARS: usize = 100;

    let escaped = text
        .trim_end()
        .replace('\\', "\\\\")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    if escaped.chars().count() > MAX_CHARS {
        let head: String = escaped.chars().take(MAX_CHARS).collect();
        format!("'{head}...'")
    } else {
        format!("'{escaped}'")
    }
}
