//! Waiter CLI - Command-line interface
//!
//! Runs the media gateway and checks media mount health.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use waiter_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "waiter")]
#[command(about = "Token-authorized media download gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level (RUST_LOG overrides it)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full trace log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.into(), cli.logs_dir.as_deref())
        .context("Failed to initialize logging")?;

    commands::handle_command(cli.command).await
}
