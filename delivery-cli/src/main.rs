//! Binary crate for the `delivery` command-line tool.
//!
//! This crate focuses on:
//! - Parsing and validating CLI arguments
//! - Mapping engine result codes to user-facing messages
//! - Driving the periodic ingestion schedule

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
