pub mod api;
pub mod binds;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod query;
pub mod sql;
pub mod telemetry;
pub mod tls;

use crate::{cli::Cli, config::AppConfig};
use clap::Parser;

/// Parses the command line, loads environment configuration and runs one lookup.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    cli::run(cli, config).await
}
