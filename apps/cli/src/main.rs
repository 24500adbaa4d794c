//! ProfileCrawl CLI: build a personal profile from a list of links.
//!
//! Each link is read by a browsing agent using a strategy picked from the
//! link's host; the results are merged into one JSON and one Markdown report.

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
