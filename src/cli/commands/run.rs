//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it merges the configuration
//! file with the command-line overrides, prepares the interpreter, discovers
//! the test files and hands them to the runner.
//!
//! 此模块实现 `run` 命令：合并配置文件与命令行覆盖项，准备解释器，发现测试文件并交给调度器运行。

use anyhow::{Context, Result, bail};
use colored::*;
use std::path::PathBuf;
use tokio::signal;
use tracing::debug;

use crate::{
    core::{
        config::{self, RunnerConfig},
        handler::TestHandler,
        planner,
        runner::Runner,
    },
    infra::{
        command::display_command_line,
        fs::OutputDirWriter,
        interpreter::{CommandInterpreter, Interpreter},
        t,
    },
    reporting::console::ConsoleReporter,
};

/// Environment variable set for every test process so a test program can
/// tell it runs under the runner.
/// 为每个测试进程设置的环境变量，使测试程序能够识别自己运行在调度器之下。
pub const RUNNER_ENV_VAR: &str = "TESTER_RUNNER";

/// Command-line arguments of `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: PathBuf,
    /// Discovery roots replacing the configured ones when non-empty.
    pub paths: Vec<PathBuf>,
    pub jobs: Option<usize>,
    /// Interpreter command line replacing the configured program and args.
    pub interpreter: Option<String>,
    /// Extra startup options as `key=value`.
    pub ini: Vec<String>,
    pub gateway: bool,
    pub show_skipped: bool,
    pub lang: Option<String>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// `Ok(true)` when every test passed or was skipped, `Ok(false)` when some
/// failed, and an error when the run could not be set up.
///
/// 使用提供的参数执行运行命令。全部通过或跳过时返回 `Ok(true)`，存在失败时返回 `Ok(false)`，
/// 无法完成准备工作时返回错误。
pub async fn execute(options: RunOptions) -> Result<bool> {
    let mut config = config::load_config(&options.config)?;
    let locale = match options.lang.as_deref().or(config.language.as_deref()) {
        Some(lang) => crate::resolve_locale(lang).to_string(),
        None => str::to_string(&rust_i18n::locale()),
    };
    rust_i18n::set_locale(&locale);

    apply_overrides(&mut config, &options)?;
    debug!(?config, "effective configuration");

    let interpreter = build_interpreter(&config, &options.ini).await?;
    println!(
        "{}",
        t!(
            "using_interpreter",
            locale = &locale,
            command = display_command_line(&interpreter.command_line()),
            version = interpreter.version()
        )
        .cyan()
    );

    let plan = planner::plan_execution(&config.paths, &config.patterns)?;
    if plan.duplicate_count > 0 {
        debug!(duplicates = plan.duplicate_count, "overlapping test paths");
    }
    if plan.is_empty() {
        println!("{}", t!("no_tests_found", locale = &locale).yellow());
        return Ok(true);
    }

    let mut env_vars = config.env.clone();
    env_vars.insert(RUNNER_ENV_VAR.to_string(), "1".to_string());

    let handler = TestHandler::new(Box::new(interpreter))
        .with_env_vars(env_vars)
        .with_diagnostics(Box::new(OutputDirWriter::new(&config.output_dir)));
    let runner = Runner::new(handler, config.jobs);
    let mut reporter = ConsoleReporter::new(locale.clone(), config.show_skipped);

    // Dropping the run future drops every job, which kills its child process.
    tokio::select! {
        summary = runner.run(&plan.files, &mut reporter) => Ok(summary?.is_success()),
        Ok(()) = signal::ctrl_c() => {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            Ok(false)
        }
    }
}

/// Applies the command-line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut RunnerConfig, options: &RunOptions) -> Result<()> {
    if !options.paths.is_empty() {
        config.paths = options.paths.clone();
    }
    if let Some(jobs) = options.jobs {
        config.jobs = jobs;
    }
    if let Some(command_line) = &options.interpreter {
        let words = shlex::split(command_line)
            .with_context(|| format!("Invalid interpreter command line: {command_line}"))?;
        let Some((program, args)) = words.split_first() else {
            bail!("Interpreter command line is empty");
        };
        config.interpreter.program = program.clone();
        config.interpreter.args = args.to_vec();
    }
    if options.gateway {
        config.interpreter.gateway = true;
    }
    if options.show_skipped {
        config.show_skipped = true;
    }
    Ok(())
}

/// Creates the base interpreter: expands the program path, probes the
/// version when the configuration does not pin one and adds the startup
/// options given on the command line.
///
/// 创建基础解释器：展开程序路径，在配置未指定版本时探测版本，并添加命令行给出的启动选项。
pub async fn build_interpreter(config: &RunnerConfig, ini: &[String]) -> Result<CommandInterpreter> {
    let settings = &config.interpreter;
    let program = shellexpand::full(&settings.program)
        .with_context(|| format!("Cannot expand interpreter path '{}'", settings.program))?
        .into_owned();

    let version = match &settings.version {
        Some(version) => version.clone(),
        None => CommandInterpreter::probe_version(&program, &settings.args).await?,
    };

    let mut interpreter = CommandInterpreter::new(program, settings.args.clone(), version)
        .with_gateway(settings.gateway)
        .with_option_flag(settings.option_flag.clone());
    for option in ini {
        let (key, value) = parse_startup_option(option);
        interpreter.add_startup_option(key, value);
    }
    Ok(interpreter)
}

fn parse_startup_option(option: &str) -> (&str, Option<&str>) {
    match option.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (option.trim(), None),
    }
}
