//! Quizsmith CLI: turn encyclopedia articles into stored multiple-choice quizzes.
//!
//! Serves the HTTP API or runs generation and history lookups directly.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real env vars still apply
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
