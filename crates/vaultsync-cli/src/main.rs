//! VaultSync CLI - command-line interface for the vault sync engine
//!
//! Provides commands for:
//! - Running sync rounds (one-shot and continuous)
//! - Viewing persisted sync state
//! - Checking quota usage
//! - Managing the vault's account binding

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    run::RunCommand, status::StatusCommand, sync::SyncCommand, unbind::UnbindCommand,
    usage::UsageCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "vaultsync", version, about = "Local-first vault synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one synchronization round
    Sync(SyncCommand),
    /// Sync continuously until interrupted
    Run(RunCommand),
    /// Show the vault's persisted sync state
    Status(StatusCommand),
    /// Show storage and vectorization quota usage
    Usage(UsageCommand),
    /// Delete the vault's account binding
    Unbind(UnbindCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(config_path, format).await,
        Commands::Run(cmd) => cmd.execute(config_path, format).await,
        Commands::Status(cmd) => cmd.execute(config_path, format).await,
        Commands::Usage(cmd) => cmd.execute(config_path, format).await,
        Commands::Unbind(cmd) => cmd.execute(config_path, format).await,
    }
}
