//! CLI module for Sentinel
//!
//! Provides commands:
//! - `serve`: Run the bot and keep-alive server (default)
//! - `classify`: Show what a reason would earn
//! - `doctor`: Configuration diagnostics

use clap::{Parser, Subcommand};

pub mod classify;
pub mod doctor;

/// Sentinel discipline bot CLI
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Progressive discipline bot for Discord communities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the bot (default)
    Serve,
    /// Classify a reason against the offense table
    Classify {
        /// Free-text reason, e.g. "spamming links"
        #[arg(required = true, num_args = 1..)]
        reason: Vec<String>,
    },
    /// Run configuration diagnostics
    Doctor,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::server::load_config()?;

    match cli.command {
        Some(Commands::Classify { reason }) => classify::run(&config, &reason.join(" ")),
        Some(Commands::Doctor) => doctor::run(&config).await,
        Some(Commands::Serve) | None => crate::server::run(config).await,
    }
}
