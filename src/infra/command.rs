//! # Command Module / 命令模块
//!
//! One-shot command helpers: running a short-lived command to completion
//! while capturing its output, and rendering command lines for logs.
//!
//! 一次性命令辅助工具：运行短命令并捕获输出，以及为日志渲染命令行。

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::infra::t;

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。
pub async fn spawn_and_capture(
    mut cmd: tokio::process::Command,
) -> (std::io::Result<std::process::ExitStatus>, String) {
    let mut child = match cmd
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other(t!("capture_output_failed").to_string())),
            String::new(),
        );
    };

    // Both readers append to one buffer so the interleaving stays close to
    // what a terminal would show.
    // 两个读取任务写入同一缓冲区，使交错顺序接近终端显示。
    let output = Arc::new(tokio::sync::Mutex::new(String::new()));

    let stdout_output = Arc::clone(&output);
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stdout_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let stderr_output = Arc::clone(&output);
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stderr_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let (status, stdout_joined, stderr_joined) =
        futures::join!(child.wait(), stdout_handle, stderr_handle);
    for joined in [stdout_joined, stderr_joined] {
        if let Err(e) = joined {
            tracing::warn!("Failed to join output reader task: {}", e);
        }
    }

    let output = output.lock().await.clone();
    (status, output)
}

/// Renders a command line the way a POSIX shell would accept it, quoting
/// each word independently.
/// 按 POSIX shell 可接受的形式渲染命令行，每个参数独立转义。
pub fn display_command_line<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            shlex::try_quote(word)
                .map(|quoted| quoted.into_owned())
                .unwrap_or_else(|_| word.replace('\0', ""))
        })
        .collect::<Vec<_>>()
        .join(" ")
}
