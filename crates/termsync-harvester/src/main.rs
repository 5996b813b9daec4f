use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::info;

use termsync_db::Database;
use termsync_harvester::{Cli, EtagCache, Fetcher, Harvester, HarvesterConfig, LogSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let _log_guard = log_settings.init().context("Failed to initialize logging")?;
    info!(
        log_format = ?log_settings.format,
        log_file = ?log_settings.file,
        "Logging initialized"
    );

    let config = HarvesterConfig::from_cli(Cli::parse()).context("Invalid configuration")?;

    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    if config.migrate {
        db.migrate().await.context("Failed to run migrations")?;
        info!(subsystem = "db", "Migrations applied");
    }

    let fetcher = Fetcher::new(config.http_timeout)?;
    let mut etags = config.etag_cache.as_ref().map(EtagCache::load);

    let harvester = Harvester::new(&db.terms, &fetcher, config.defaults);
    let report = harvester
        .run(&config.collections, etags.as_mut(), config.dry_run, Utc::now())
        .await
        .context("Harvest aborted")?;
    report.log();
    termsync_db::log_pool_metrics(db.pool());

    Ok(())
}
