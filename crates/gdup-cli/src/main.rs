//! gdup CLI - push local directory trees to Google Drive
//!
//! Provides commands for:
//! - Running every configured directory mapping
//! - One-shot folder creation, uploads and listings
//! - Reading the transaction log
//! - Inspecting the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    audit::AuditCommand, config::ConfigCommand, ls::LsCommand, mkpath::MkpathCommand,
    run::RunCommand, upload::UploadCommand, ConfigSource,
};
use gdup_core::config::{Config, LoggingConfig};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "gdup", version, about = "Push local directories to Google Drive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize every configured directory
    Run(RunCommand),
    /// Create a folder path below the target root
    Mkpath(MkpathCommand),
    /// Upload a single file
    Upload(UploadCommand),
    /// List the children of a remote folder
    Ls(LsCommand),
    /// Read the transaction log
    Audit(AuditCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Installs the diagnostic subscriber
///
/// `RUST_LOG` wins, then `-v`, then `logging.level` from the config file.
fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = ConfigSource::resolve(cli.config.clone());

    let logging = Config::load(source.path())
        .map(|c| c.logging)
        .unwrap_or_default();
    init_tracing(cli.verbose, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&source, format).await,
        Commands::Mkpath(cmd) => cmd.execute(&source, format).await,
        Commands::Upload(cmd) => cmd.execute(&source, format).await,
        Commands::Ls(cmd) => cmd.execute(&source, format).await,
        Commands::Audit(cmd) => cmd.execute(&source, format).await,
        Commands::Config(cmd) => cmd.execute(&source, format).await,
    }
}
