#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use reasoner_console::app;
use reasoner_console::cli::commands::Cli;
use reasoner_console::config::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_init()?;
    config.apply_env_overrides();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.observability.log_level.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    app::dispatch::dispatch(cli, config).await
}
