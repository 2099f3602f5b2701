//! taggable CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging: flag first, then the configured level
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config::AppConfig::log_level(cli.config.as_deref()));
    init_logging(&log_level)?;

    // Execute command
    match cli.command {
        Commands::Tags(args) => commands::tags::execute(args, cli.config).await,
        Commands::Subject(args) => commands::subject::execute(args, cli.config).await,
        Commands::Query(args) => commands::query::execute(args, cli.config).await,
        Commands::Config(args) => commands::config::execute(args, cli.config).await,
        Commands::Doctor(args) => commands::doctor::execute(args, cli.config).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
