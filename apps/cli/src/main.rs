//! ContactFill CLI: resumable contact enrichment for CSV exports.
//!
//! Fills the missing email column of a connections export by looking each
//! person up on the source site, checkpointing after every lookup so an
//! interrupted run picks up where it stopped.

mod commands;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
