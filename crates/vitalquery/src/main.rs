#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vitalquery::cli::app::{Cli, Command, RuntimeArgs};
use vitalquery::cli::commands::{self, CommandContext, EXIT_RECURSION_LIMIT};
use vitalquery::config::{AppConfig, ConfigOverrides, RuntimePaths};
use vitalquery::error::AgentError;
use vitalquery::models::EnvelopeFailure;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = cli.command.name();

    let context = match resolve_context(&cli.runtime) {
        Ok(context) => context,
        Err(error) => {
            eprintln!("vitalquery: failed `{command_name}` (exit_code={EXIT_RUNTIME_FAILURE})");
            eprintln!("{error:#}");
            return EXIT_RUNTIME_FAILURE;
        }
    };
    init_logging(&context.config.log_level);
    info!("vitalquery: starting `{command_name}`");

    match execute(&cli.command, &context) {
        Ok(()) => {
            info!("vitalquery: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(failure) => {
            let exit_code = classify_runtime_error(&failure);
            error!("vitalquery: failed `{command_name}` (exit_code={exit_code})");
            if failure.downcast_ref::<EnvelopeFailure>().is_some() {
                println!("{failure}");
            } else {
                eprintln!("{failure:#}");
            }
            exit_code
        }
    }
}

fn execute(command: &Command, context: &CommandContext) -> Result<()> {
    match command {
        Command::Ask(args) => commands::ask::run(args, context),
        Command::Validate(args) => commands::validate::run(args, context),
        Command::Normalize(args) => commands::normalize::run(args, context),
        Command::Schema(args) => commands::schema::run(args, context),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<EnvelopeFailure>() {
        failure.exit_code()
    } else if error
        .downcast_ref::<AgentError>()
        .is_some_and(AgentError::is_recursion_limit)
    {
        EXIT_RECURSION_LIMIT
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
        _ => EXIT_USAGE_ERROR,
    }
}

fn resolve_context(args: &RuntimeArgs) -> Result<CommandContext> {
    let home_dir = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))?;
    let cwd = std::env::current_dir()?;
    let paths = RuntimePaths::new(&home_dir, &cwd)?;

    let config_file = args
        .config
        .as_deref()
        .map(|path| paths.resolve(path))
        .transpose()?;
    let overrides = ConfigOverrides {
        database: args.db.clone(),
        log_level: args.log_level.clone(),
        recursion_limit: None,
    };
    let config = AppConfig::load(
        config_file.as_deref(),
        |key| std::env::var(key).ok(),
        &overrides,
    )?;
    Ok(CommandContext { config, paths })
}

/// Logs go to stderr; stdout carries only answers and envelopes.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
