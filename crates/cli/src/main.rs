//! savedpages-migrate entry point.
//!
//! Runs the saved page conversion once and prints the outcome as JSON on
//! stdout. Logging goes to stderr so the outcome can be piped.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use savedpages_core::{AppConfig, JsonPageSource, SettingsDb};
use savedpages_engine::{Migrator, render};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert saved pages from the legacy response cache", long_about = None)]
struct Cli {
    /// Run even if a previous run already completed the conversion.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        legacy = %config.legacy_cache_dir.display(),
        converted = %config.converted_dir.display(),
        renderer = ?config.renderer,
        force = cli.force,
        "starting saved page conversion"
    );

    let settings = SettingsDb::open(&config.settings_db_path)
        .await
        .context("opening settings database")?;
    let source = JsonPageSource::new(&config.reading_lists_path);
    let renderer = render::from_config(&config)?;

    let migrator = Migrator::new(&config, Arc::new(source), Arc::new(settings), renderer);
    let outcome = if cli.force { migrator.run_forced().await? } else { migrator.run().await? };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_complete() {
        tracing::warn!("conversion incomplete; rerun to retry the remaining pages");
    }

    Ok(())
}
