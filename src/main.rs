//! CLI interface for walkabout (§6 external interfaces).
//!
//! Grounded on the teacher's `main.rs` (clap `Subcommand` layout, one
//! function per command, JSON-to-stdout or `--output` file) but retargeted
//! at this crate's domain: airport lookups, currency conversion, and
//! triggering a one-off scrape or trip search against the local database.

use clap::{Parser, Subcommand};
use std::fs;
use walkabout::airports::AirportCatalog;
use walkabout::config::Settings;
use walkabout::currency::CurrencyService;
use walkabout::db::Database;
use walkabout::models::{SearchDates, SearchDefinition};
use walkabout::scraping_service::ScrapingService;
use walkabout::sources::amadeus::AmadeusSource;
use walkabout::sources::browser::BrowserSource;
use walkabout::sources::serpapi::SerpApiSource;
use walkabout::sources::skyscanner::SkyscannerSource;
use walkabout::sources::PriceSource;
use walkabout::{CabinClass, StopsFilter, TripType};

#[derive(Parser)]
#[command(name = "walkabout")]
#[command(about = "Self-hosted flight-deal aggregator and price-history monitor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up an airport by IATA code, or search by name/city substring.
    Airport {
        /// IATA code (e.g. AKL) or a free-text query
        query: String,
        /// Treat `query` as a search term rather than an exact code
        #[arg(long)]
        search: bool,
        /// Maximum results when `--search` is set
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Convert an amount between currencies.
    Convert {
        amount: f64,
        from: String,
        to: String,
    },
    /// Register a fixed-date search definition and scrape it once.
    Scrape {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Departure date, YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Return date for round trips, YYYY-MM-DD
        #[arg(long)]
        return_date: Option<String>,
        #[arg(long, default_value = "1")]
        adults: i32,
        #[arg(long, default_value = "economy")]
        class: String,
        #[arg(long, default_value = "NZD")]
        currency: String,
        /// Write the resulting run summary to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Run the rolling scrape sweep for every active search definition.
    ScrapeAll,
}

fn adapters_from_settings(settings: &Settings) -> Vec<Box<dyn PriceSource>> {
    vec![
        Box::new(SerpApiSource::new(settings.serpapi_key.clone())),
        Box::new(SkyscannerSource::new(settings.skyscanner_api_key.clone())),
        Box::new(AmadeusSource::new(
            settings.amadeus_client_id.clone(),
            settings.amadeus_client_secret.clone(),
            settings.amadeus_base_url.clone(),
        )),
        Box::new(BrowserSource::new(None, std::path::PathBuf::from(&settings.data_dir).join("screenshots"))),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let settings = Settings::global();

    match cli.command {
        Commands::Airport { query, search, limit } => {
            let catalog = AirportCatalog::fallback();
            if search {
                let results = catalog.search(&query, limit);
                println!("{}", serde_json::to_string_pretty(&results.iter().map(|a| (&a.code, &a.name, &a.city)).collect::<Vec<_>>())?);
            } else {
                match catalog.lookup(&query) {
                    Some(airport) => println!("{airport:#?}"),
                    None => eprintln!("no airport found for {query}"),
                }
            }
        }
        Commands::Convert { amount, from, to } => {
            let converted = CurrencyService::new().convert(amount, &from, &to).await;
            match converted {
                Some(value) => println!("{}", CurrencyService::format_price(value, &to, true)),
                None => eprintln!("no conversion rate available for {from} -> {to}"),
            }
        }
        Commands::Scrape { from, to, date, return_date, adults, class, currency, output } => {
            let db = Database::open(&settings.database_url.trim_start_matches("sqlite://"))?;
            let dep = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")?;
            let ret = return_date.as_deref().map(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")).transpose()?;
            let trip_type = if ret.is_some() { TripType::RoundTrip } else { TripType::OneWay };
            let def = SearchDefinition::new(
                0,
                &from,
                &to,
                trip_type,
                SearchDates::Fixed { departure_date_start: dep, departure_date_end: ret.unwrap_or(dep) },
                adults,
                0,
                0,
                0,
                class.parse::<CabinClass>().unwrap_or(CabinClass::Economy),
                StopsFilter::Any,
                &currency,
            )?;
            let id = db.insert_search_definition(&def)?;

            let adapters = adapters_from_settings(settings);
            let service = ScrapingService::with_ai(db, walkabout::ai::AIService::new(settings.anthropic_api_key.clone()));
            let run = service.run(id, &adapters).await?;
            let summary = serde_json::to_string_pretty(&serde_json::json!({
                "search_definition_id": id,
                "status": format!("{:?}", run.status),
                "deal": run.deal.map(|(price, analysis)| serde_json::json!({
                    "price": price.price_per_passenger,
                    "currency": price.currency,
                    "is_deal": analysis.is_deal,
                    "reason": analysis.reason,
                })),
                "ai_recommendation": run.ai_recommendation,
            }))?;
            match output {
                Some(path) => fs::write(path, summary)?,
                None => println!("{summary}"),
            }
        }
        Commands::ScrapeAll => {
            let db = Database::open(&settings.database_url.trim_start_matches("sqlite://"))?;
            let adapters = adapters_from_settings(settings);
            let ids = db.active_search_definition_ids()?;
            let service = ScrapingService::with_ai(db, walkabout::ai::AIService::new(settings.anthropic_api_key.clone()));
            for id in ids {
                match service.run(id, &adapters).await {
                    Ok(run) => println!("search {id}: {:?}", run.status),
                    Err(err) => eprintln!("search {id} failed: {err}"),
                }
            }
        }
    }

    Ok(())
}
