// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod commands;
mod config;

use anyhow::{Context, Result, anyhow};
use commands::PageChoice;
use config::Config;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GRIDSYNC_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }
    init_logging();

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `gridsync --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let output = match options.command {
        Command::Check => commands::check(&config).with_context(|| {
            format!(
                "check [api] in {}; fix base_url/resource/timeout or start the server",
                options.config_path.display()
            )
        })?,
        Command::List(choice) => commands::list(&config, choice)?,
        Command::ShowView => commands::show_view(&config)?,
        Command::ResetView => commands::reset_view(&config)?,
        Command::None => {
            print_help();
            return Ok(());
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}

/// Logs go to stderr so command output stays pipeable.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    None,
    Check,
    List(PageChoice),
    ShowView,
    ResetView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    command: Command,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        command: Command::None,
        show_help: false,
    };
    let mut choice = PageChoice::default();
    let mut commands = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => commands.push(Command::Check),
            "--list" => commands.push(Command::List(PageChoice::default())),
            "--show-view" => commands.push(Command::ShowView),
            "--reset" => commands.push(Command::ResetView),
            "--page" => choice.page = Some(parse_number(&mut iter, "--page")?),
            "--size" => choice.size = Some(parse_number(&mut iter, "--size")?),
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if commands.len() > 1 {
        return Err(anyhow!(
            "--check, --list, --show-view and --reset are exclusive; pick one"
        ));
    }
    options.command = match commands.pop() {
        Some(Command::List(_)) => Command::List(choice),
        Some(command) => command,
        None => Command::None,
    };
    if choice != PageChoice::default() && !matches!(options.command, Command::List(_)) {
        return Err(anyhow!("--page and --size only apply to --list"));
    }

    Ok(options)
}

fn parse_number<I, S>(iter: &mut I, flag: &str) -> Result<u32>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let value = iter
        .next()
        .ok_or_else(|| anyhow!("{flag} requires a positive number"))?;
    let raw = value.as_ref();
    match raw.parse::<u32>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(anyhow!("{flag} requires a positive number, got {raw:?}")),
    }
}

fn print_help() {
    println!("gridsync");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and reach the API");
    println!("  --list                   Fetch and print one page using the stored view");
    println!("    --page <n>             Page to fetch (default: 1)");
    println!("    --size <n>             Page size, snapped to 10/25/50/100");
    println!("  --show-view              Print the stored filter model and column state");
    println!("  --reset                  Forget the stored view for the configured grid");
    println!("  --help                   Show this help");
    println!();
    println!("Set {LOG_ENV} (for example {LOG_ENV}=debug) to change log verbosity.");
}
