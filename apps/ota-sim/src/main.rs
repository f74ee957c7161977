//! OTA transfer simulator entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting OTA simulator");

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    cli.apply(&mut config);
    tracing::info!(slot = %config.slot_path.display(), "configuration loaded");

    // Events are dispatched one at a time on a single thread.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = rt.block_on(app::run(config, &cli.image))?;

    match outcome.verified {
        Some(true) => tracing::info!(summary = ?outcome.summary, "image installed and verified"),
        Some(false) => anyhow::bail!("slot contents do not match the image"),
        None if outcome.entered_dfu => tracing::info!("device rebooted into DFU mode"),
        None => anyhow::bail!("transfer did not complete"),
    }
    Ok(())
}
