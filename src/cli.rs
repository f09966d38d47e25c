//! # Command-Line Interface Module / 命令行接口模块
//!
//! Builds the clap command tree with localized help texts and dispatches to
//! the subcommands.
//!
//! 使用本地化的帮助文本构建 clap 命令树，并分派到各个子命令。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::config::DEFAULT_CONFIG_FILE;
use crate::infra::t;
use commands::run::RunOptions;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter().enumerate().find_map(|(pos, arg)| {
        if arg == "--lang" {
            args.get(pos + 1).cloned()
        } else {
            arg.strip_prefix("--lang=").map(str::to_string)
        }
    })
}

/// Builds the command tree, with help texts in `locale`.
/// 构建命令树，帮助文本使用 `locale` 语言。
pub fn build_cli(locale: &str) -> Command {
    Command::new("tester-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("paths")
                        .help(t!("arg_paths", locale = locale).to_string())
                        .value_name("PATH")
                        .num_args(0..)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value(DEFAULT_CONFIG_FILE)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("interpreter")
                        .short('p')
                        .long("interpreter")
                        .help(t!("arg_interpreter", locale = locale).to_string())
                        .value_name("COMMAND")
                        .allow_hyphen_values(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("ini")
                        .short('d')
                        .long("ini")
                        .help(t!("arg_ini", locale = locale).to_string())
                        .value_name("KEY=VALUE")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("gateway")
                        .long("gateway")
                        .help(t!("arg_gateway", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("show-skipped")
                        .short('s')
                        .long("show-skipped")
                        .help(t!("arg_show_skipped", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_init_output", locale = locale).to_string())
                        .value_name("FILE")
                        .default_value(DEFAULT_CONFIG_FILE)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn run_options(matches: &ArgMatches, lang: Option<String>) -> RunOptions {
    RunOptions {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        paths: matches
            .get_many::<PathBuf>("paths")
            .map(|paths| paths.cloned().collect())
            .unwrap_or_default(),
        jobs: matches.get_one::<usize>("jobs").copied(),
        interpreter: matches.get_one::<String>("interpreter").cloned(),
        ini: matches
            .get_many::<String>("ini")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        gateway: matches.get_flag("gateway"),
        show_skipped: matches.get_flag("show-skipped"),
        lang,
    }
}

/// Parses the process arguments and runs the selected subcommand.
/// Returns `false` when the run finished with failed tests.
///
/// 解析进程参数并运行所选子命令。运行结束且存在失败测试时返回 `false`。
pub async fn run() -> Result<bool> {
    // Pre-parse language and initialize i18n first.
    let requested = pre_parse_language();
    let language = match requested.as_deref() {
        Some(lang) => crate::resolve_locale(lang).to_string(),
        None => {
            crate::init();
            str::to_string(&rust_i18n::locale())
        }
    };
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let lang = run_matches.get_one::<String>("lang").cloned().or(requested);
            commands::run::execute(run_options(run_matches, lang)).await
        }
        Some(("init", init_matches)) => {
            let output = init_matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            let force = init_matches.get_flag("force");
            commands::init::execute(output, force, &language)?;
            Ok(true)
        }
        // `subcommand_required` makes clap print help and exit before this point.
        _ => Ok(true),
    }
}
