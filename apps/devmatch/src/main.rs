use anyhow::Context;
use clap::Parser;
use devmatch_client_core::telemetry::logging;
use devmatch_client_core::terminal::{app, cli::Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config()).context("failed to initialise logging")?;
    app::run(cli).await?;
    Ok(())
}
