//! # Job Module / 任务模块
//!
//! A `Job` owns one live child process bound to a single `Test` variant.
//! It builds the command line, spawns the child in the test file's
//! directory, collects stdout/stderr without blocking the scheduler and,
//! once the child has exited, resolves the exit code and the optional
//! HTTP-style header preamble.
//!
//! `Job` 拥有绑定到单个 `Test` 变体的子进程。它构建命令行，在测试文件所在目录中启动子进程，
//! 在不阻塞调度器的情况下收集 stdout/stderr，并在子进程退出后解析退出码和可选的 HTTP 头。

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::models::Test;
use crate::infra::command::display_command_line;
use crate::infra::interpreter::Interpreter;

/// Exit code sentinel: the process has not finished yet.
pub const CODE_NONE: i32 = -1;
pub const CODE_OK: i32 = 0;
pub const CODE_SKIP: i32 = 177;
pub const CODE_FAIL: i32 = 178;
pub const CODE_ERROR: i32 = 255;

/// Pause between two liveness checks of a synchronously run job.
/// Child pipes offer no portable blocking multiplexing, so waiting is a
/// bounded sleep loop.
/// 同步运行任务时两次存活检查之间的间隔。
pub const RUN_SLEEP: Duration = Duration::from_millis(10);

/// How long the pipes may stay open after the child has exited.
/// A grandchild that inherited the pipes can keep them open indefinitely.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Block until the child exits.
    /// 阻塞直到子进程退出。
    Sync,
    /// Return right after spawning; the caller drives `poll`.
    /// 启动后立即返回，由调用方驱动 `poll`。
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Pending,
    Running,
    /// The child has exited; its pipes are still being read.
    Draining { status: ExitStatus, deadline: Instant },
    Finished,
}

#[derive(Debug)]
enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

#[derive(Debug)]
struct Process {
    child: Child,
    chunks: mpsc::UnboundedReceiver<Chunk>,
    readers: Vec<JoinHandle<()>>,
}

/// Single test job.
/// 单个测试任务。
#[derive(Debug)]
pub struct Job {
    test: Test,
    interpreter: Box<dyn Interpreter>,
    env_vars: BTreeMap<String, String>,
    locks: Vec<String>,
    state: JobState,
    process: Option<Process>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
    headers: BTreeMap<String, String>,
    started_at: Option<Instant>,
    duration: Duration,
}

impl Job {
    pub fn new(
        test: Test,
        interpreter: Box<dyn Interpreter>,
        env_vars: BTreeMap<String, String>,
    ) -> Self {
        debug_assert!(!test.has_result(), "jobs are only created for unresolved tests");
        Self {
            test,
            interpreter,
            env_vars,
            locks: Vec::new(),
            state: JobState::Pending,
            process: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: CODE_NONE,
            headers: BTreeMap::new(),
            started_at: None,
            duration: Duration::ZERO,
        }
    }

    /// Lock names the scheduler must hold while this job runs.
    pub fn with_locks(mut self, locks: Vec<String>) -> Self {
        self.locks = locks;
        self
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn interpreter(&self) -> &dyn Interpreter {
        self.interpreter.as_ref()
    }

    pub fn locks(&self) -> &[String] {
        &self.locks
    }

    /// Exit code of the finished child, `CODE_NONE` before that.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Response headers parsed in gateway mode.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }

    /// Full command line: interpreter, test file, then the variant's arguments.
    /// 完整命令行：解释器、测试文件，然后是变体参数。
    pub fn command_line(&self) -> Vec<String> {
        let mut words = self.interpreter.command_line();
        words.push(self.test.file().to_string_lossy().into_owned());
        words.extend(self.test.job_arguments());
        words
    }

    /// Spawns the child process. A job is single-use: calling `run` a second
    /// time is an error.
    ///
    /// 启动子进程。任务只能使用一次，重复调用 `run` 会返回错误。
    pub async fn run(&mut self, mode: RunMode) -> Result<()> {
        if self.state != JobState::Pending {
            bail!(
                "Job for '{}' has already been started",
                self.test.file().display()
            );
        }
        self.state = JobState::Running;

        let file = std::path::absolute(self.test.file()).with_context(|| {
            format!("Failed to resolve test file: {}", self.test.file().display())
        })?;
        let dir = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let mut words = self.interpreter.command_line();
        words.push(file.to_string_lossy().into_owned());
        words.extend(self.test.job_arguments());
        let Some((program, args)) = words.split_first() else {
            self.state = JobState::Finished;
            bail!("Interpreter command line is empty");
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&dir)
            .envs(&self.env_vars)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %display_command_line(&words), dir = %dir.display(), "spawning test job");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state = JobState::Finished;
                return Err(e).with_context(|| {
                    format!("Cannot start '{}'", display_command_line(&words))
                });
            }
        };
        self.started_at = Some(Instant::now());

        // The test gets no input; closing stdin lets readers of it see EOF.
        drop(child.stdin.take());

        let (tx, chunks) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone(), Chunk::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx, Chunk::Stderr));
        }
        self.process = Some(Process {
            child,
            chunks,
            readers,
        });

        if mode == RunMode::Sync {
            while self.poll().await? {
                tokio::time::sleep(RUN_SLEEP).await;
            }
        }
        Ok(())
    }

    /// Collects the output produced so far and checks whether the job is
    /// still busy. Returns `true` while the child runs and while its output
    /// pipes are being drained after the exit; never waits for either. On
    /// the call that returns `false`, the exit code, the headers and the
    /// output on the bound `Test` become final.
    ///
    /// 收集目前为止的输出并检查任务是否仍在进行：子进程运行期间以及退出后读取剩余输出期间返回 `true`，
    /// 且从不等待。返回 `false` 的那次调用会确定退出码、响应头以及绑定 `Test` 上的输出。
    pub async fn poll(&mut self) -> Result<bool> {
        let Some(process) = self.process.as_mut() else {
            return Ok(false);
        };
        drain(&mut process.chunks, &mut self.stdout, &mut self.stderr);

        let (status, deadline) = match self.state {
            JobState::Draining { status, deadline } => (status, deadline),
            _ => {
                let Some(status) = process
                    .child
                    .try_wait()
                    .context("Failed to query test process status")?
                else {
                    return Ok(true);
                };
                self.duration = self
                    .started_at
                    .map(|started| started.elapsed())
                    .unwrap_or_default();
                let deadline = Instant::now() + PIPE_DRAIN_TIMEOUT;
                self.state = JobState::Draining { status, deadline };
                (status, deadline)
            }
        };

        if !process.readers.iter().all(JoinHandle::is_finished) {
            if Instant::now() < deadline {
                return Ok(true);
            }
            warn!(
                file = %self.test.file().display(),
                "test process exited but its output pipes stayed open"
            );
            process.readers.iter().for_each(JoinHandle::abort);
        }
        drain(&mut process.chunks, &mut self.stdout, &mut self.stderr);
        self.process = None;

        self.finish(status);
        Ok(false)
    }

    fn finish(&mut self, status: ExitStatus) {
        self.exit_code = exit_code_of(status);
        self.state = JobState::Finished;

        let mut stdout = String::from_utf8_lossy(&self.stdout).into_owned();
        if self.interpreter.is_gateway() {
            if let Some((headers, body)) = split_headers(&stdout) {
                self.headers = headers;
                stdout = body.to_string();
            }
        }
        let stderr = String::from_utf8_lossy(&self.stderr).into_owned();

        debug!(
            file = %self.test.file().display(),
            exit_code = self.exit_code,
            duration = ?self.duration,
            "test job finished"
        );
        self.test = self.test.with_output(stdout, stderr);
    }
}

fn spawn_reader<R>(
    mut pipe: R,
    tx: mpsc::UnboundedSender<Chunk>,
    wrap: fn(Vec<u8>) -> Chunk,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(wrap(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn drain(chunks: &mut mpsc::UnboundedReceiver<Chunk>, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>) {
    while let Ok(chunk) = chunks.try_recv() {
        match chunk {
            Chunk::Stdout(bytes) => stdout.extend_from_slice(&bytes),
            Chunk::Stderr(bytes) => stderr.extend_from_slice(&bytes),
        }
    }
}

/// The wait status carries the code; a process killed by a signal has none
/// and reports `128 + signal` like a shell would.
fn exit_code_of(status: ExitStatus) -> i32 {
    let code = status.code().unwrap_or(CODE_NONE);
    if code != CODE_NONE {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    CODE_ERROR
}

/// Splits an HTTP-style preamble off `output`. Only applies when a blank
/// line terminates a block made of `Name: value` lines.
/// 从输出中分离 HTTP 风格的头部，仅当空行之前全部是 `Name: value` 行时生效。
fn split_headers(output: &str) -> Option<(BTreeMap<String, String>, &str)> {
    let (pos, separator) = ["\r\n\r\n", "\n\n"]
        .iter()
        .filter_map(|sep| output.find(sep).map(|pos| (pos, sep.len())))
        .min_by_key(|(pos, _)| *pos)?;

    let mut headers = BTreeMap::new();
    for line in output[..pos].lines() {
        let (name, value) = line.split_once(':')?;
        if !is_header_name(name) {
            return None;
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    if headers.is_empty() {
        return None;
    }
    Some((headers, &output[pos + separator..]))
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_!#$%&'*+.^`|~".contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_split_at_first_blank_line() {
        let (headers, body) =
            split_headers("Status: 404 Not Found\r\nX-Powered-By: test\r\n\r\nbody\n\nmore").unwrap();
        assert_eq!(headers.get("Status").map(String::as_str), Some("404 Not Found"));
        assert_eq!(headers.get("X-Powered-By").map(String::as_str), Some("test"));
        assert_eq!(body, "body\n\nmore");
    }

    #[test]
    fn output_without_blank_line_has_no_headers() {
        assert!(split_headers("Status: 200\nbody").is_none());
    }

    #[test]
    fn plain_paragraphs_are_not_headers() {
        assert!(split_headers("first paragraph\n\nsecond paragraph\n").is_none());
        assert!(split_headers("Note: see below\nplain text\n\nrest").is_none());
        assert!(split_headers("Time taken: 3 s\n\nrest").is_none());
        assert!(split_headers("\n\nrest").is_none());
    }
}
