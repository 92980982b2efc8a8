//! Long-running daemon: opens the database, wires the four price-source
//! adapters and the notifier, and lets the scheduler (§4.J) run its jobs
//! until the process receives a shutdown signal.

use std::sync::Arc;
use walkabout::config::Settings;
use walkabout::db::Database;
use walkabout::notifier::Notifier;
use walkabout::scheduler::Scheduler;
use walkabout::sources::amadeus::AmadeusSource;
use walkabout::sources::browser::BrowserSource;
use walkabout::sources::serpapi::SerpApiSource;
use walkabout::sources::skyscanner::SkyscannerSource;
use walkabout::sources::PriceSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let settings = Settings::global();
    if !settings.scheduler_enabled {
        tracing::info!("scheduler disabled via SCHEDULER_ENABLED, exiting");
        return Ok(());
    }

    let db = Database::open(settings.database_url.trim_start_matches("sqlite://"))?;
    let adapters: Vec<Box<dyn PriceSource>> = vec![
        Box::new(SerpApiSource::new(settings.serpapi_key.clone())),
        Box::new(SkyscannerSource::new(settings.skyscanner_api_key.clone())),
        Box::new(AmadeusSource::new(
            settings.amadeus_client_id.clone(),
            settings.amadeus_client_secret.clone(),
            settings.amadeus_base_url.clone(),
        )),
        Box::new(BrowserSource::new(None, std::path::PathBuf::from(&settings.data_dir).join("screenshots"))),
    ];
    let notifier = Notifier::new();

    let scheduler = Arc::new(Scheduler::new(db, settings, adapters, notifier));
    let handles = scheduler.spawn();

    tracing::info!("walkabout scheduler started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping scheduler jobs");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
