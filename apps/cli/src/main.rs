//! Hunter CLI: acquire leads from configured sources and triage them.
//!
//! Runs the acquisition pipeline over every active source and offers a
//! terminal triage queue for the staged results.

mod commands;

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
