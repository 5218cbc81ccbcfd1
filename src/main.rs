use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pythfeed::application::{Cli, CommandExecutor};
use pythfeed::shared::config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    CommandExecutor::execute(cli.command, config).await?;
    Ok(())
}
