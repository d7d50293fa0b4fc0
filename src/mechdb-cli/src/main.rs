mod cli;
mod config;
mod publish;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (should_parse, should_push) = cli.actions();

    if should_parse {
        let options = cli.ingest_options()?;
        mechdb::run(options).context("ingest failed")?;
    }

    if should_push {
        publish::run(&cli).context("publish failed")?;
    }

    Ok(())
}
