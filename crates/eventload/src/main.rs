//! eventload - Main entry point

use anyhow::Context;
use clap::Parser;
use eventload::config::parse_delimiter;
use eventload::pipeline::check_file;
use eventload::{connect_store, Cli, Command, Config, Pipeline, RunArgs, RunOutcome};
use eventload_common::logging::{init_logging, LogConfig, LogOutput};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, Dispatch, Level};

/// Exit status when another run holds the lock
const EXIT_ALREADY_RUNNING: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(Level::INFO)
        .output(LogOutput::Console)
        .log_file_prefix("eventload")
        .build();

    // Environment variables take precedence; --verbose wins over both
    let mut log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };
    if cli.verbose {
        log_config.level = Level::DEBUG;
    }

    let logging = match init_logging(&log_config) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };
    let _default = tracing::dispatcher::set_default(&logging.dispatch());

    match execute_command(&cli, logging.dispatch()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, dispatch: Dispatch) -> anyhow::Result<ExitCode> {
    match cli.resolved_command() {
        Command::Run(args) => run(&args, dispatch).await,
        Command::Check { file, delimiter } => check(&file, delimiter.as_deref()),
        Command::InitSchema { database_url } => {
            init_schema(RunArgs {
                database_url,
                ..RunArgs::default()
            })
            .await
        },
    }
}

async fn run(args: &RunArgs, dispatch: Dispatch) -> anyhow::Result<ExitCode> {
    let mut config = Config::load().context("Failed to load configuration")?;
    args.apply(&mut config).context("Invalid command-line override")?;

    let store = connect_store(&config.database)
        .await
        .context("Failed to connect to the database")?;
    store.ensure_schema().await.context("Failed to prepare the schema")?;

    let outcome = Pipeline::new(config.pipeline, store)
        .with_dispatch(dispatch)
        .run()
        .await?;

    Ok(match outcome {
        RunOutcome::Completed(_) | RunOutcome::NoWork => ExitCode::SUCCESS,
        RunOutcome::AlreadyRunning => ExitCode::from(EXIT_ALREADY_RUNNING),
    })
}

fn check(file: &Path, delimiter: Option<&str>) -> anyhow::Result<ExitCode> {
    let delimiter = match delimiter {
        Some(d) => parse_delimiter(d)?,
        None => Config::load()?.pipeline.delimiter,
    };

    let report = check_file(file, delimiter)?;
    for (line, reason) in &report.problems {
        println!("line {}: {}", line, reason);
    }
    println!(
        "{}: {} rows, {} accepted, {} malformed, {} rejected",
        file.display(),
        report.summary.rows,
        report.summary.inserted,
        report.summary.malformed,
        report.summary.rejected
    );

    Ok(ExitCode::SUCCESS)
}

async fn init_schema(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = Config::load().context("Failed to load configuration")?;
    args.apply(&mut config)?;

    let store = connect_store(&config.database).await?;
    store.ensure_schema().await?;
    info!(table = %config.database.table, "Schema initialized");

    Ok(ExitCode::SUCCESS)
}
