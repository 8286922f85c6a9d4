//! LifePause command-line entry point.
//!
//! # Responsibility
//! - Smoke-check core linkage (`ping`, `version`).
//! - Drive freeze periods and inspect freeze state against a SQLite file.
//! - Serve HTTP with the module freeze guard installed.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliResult;
use lifepause_core::{default_log_level, init_logging_with, LogSettings};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    init_cli_logging(&cli)?;

    match cli.command {
        Commands::Ping => {
            println!("lifepause_core ping={}", lifepause_core::ping());
            Ok(())
        }
        Commands::Version => {
            println!("lifepause_core version={}", lifepause_core::core_version());
            Ok(())
        }
        Commands::Frozen { db, owner, guard } => {
            commands::frozen(&db.path, owner, guard.to_config()?).await
        }
        Commands::Period(command) => commands::period(command),
        Commands::Serve {
            db,
            addr,
            owner_header,
            guard,
        } => commands::serve(&db.path, addr, &owner_header, guard.to_config()?).await,
    }
}

fn init_cli_logging(cli: &Cli) -> CliResult<()> {
    let Some(log_dir) = cli.log_dir.as_deref() else {
        return Ok(());
    };
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let mut settings = LogSettings::new(level, log_dir)?;
    if matches!(cli.command, Commands::Serve { .. }) {
        settings = settings.mirrored_to_stderr();
    }
    init_logging_with(settings)?;
    Ok(())
}
