//! import-video - Main entry point

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;
use vimport_cli::commands::{list, status, upload};
use vimport_cli::config::{ImporterConfig, DEFAULT_STORAGE};
use vimport_cli::{Cli, Commands};
use vimport_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::default()
        .with_level(LogLevel::from_flags(cli.verbose, cli.quiet))
        .with_output(LogOutput::Console)
        .with_file_prefix("import-video");

    // Environment variables take precedence over the flags
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid LOG_* setting: {}", e);
            log_config
        },
    };

    // Keep the guard alive so file logs are flushed on exit
    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    let code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            1
        },
    };

    drop(guard);
    process::exit(code);
}

/// Execute the CLI command, returning the process exit code
async fn execute_command(cli: &Cli) -> vimport_cli::Result<i32> {
    match &cli.command {
        Commands::Upload(args) => {
            let config = upload::resolve_config(args, cli.storage.as_deref(), cli.config.as_deref())?;
            let report = upload::run(config, !cli.quiet).await?;
            if !cli.quiet {
                upload::print_summary(&report);
            }
            Ok(if report.is_complete() { 0 } else { 1 })
        },

        Commands::List { format, output } => {
            list::run(&storage_path(cli)?, format, output.as_deref())?;
            Ok(0)
        },

        Commands::Status => {
            status::run(&storage_path(cli)?)?;
            Ok(0)
        },
    }
}

/// Ledger location for the read-only commands: flag, then config file, then default
fn storage_path(cli: &Cli) -> vimport_cli::Result<PathBuf> {
    if let Some(storage) = &cli.storage {
        return Ok(storage.clone());
    }
    match &cli.config {
        Some(path) => Ok(ImporterConfig::load(path)?.storage),
        None => Ok(PathBuf::from(DEFAULT_STORAGE)),
    }
}
