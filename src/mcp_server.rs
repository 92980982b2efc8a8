// src/mcp_server.rs

use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use serde::Deserialize;
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

/// MCP surface over the airport catalog, currency service, and scraping
/// pipeline. Mirrors the teacher's single-`FlightServer`-struct-plus-`tool`
/// shape, retargeted from flight search to this crate's domain.
#[derive(Clone)]
pub struct WalkaboutServer {
    db: Database,
    catalog: std::sync::Arc<AirportCatalog>,
    currency: std::sync::Arc<CurrencyService>,
    settings: &'static Settings,
}

impl WalkaboutServer {
    pub fn new(settings: &'static Settings, db: Database) -> Self {
        Self {
            db,
            catalog: std::sync::Arc::new(AirportCatalog::fallback()),
            currency: std::sync::Arc::new(CurrencyService::new()),
            settings,
        }
    }

    fn adapters(&self) -> Vec<Box<dyn PriceSource>> {
        vec![
            Box::new(SerpApiSource::new(self.settings.serpapi_key.clone())),
            Box::new(SkyscannerSource::new(self.settings.skyscanner_api_key.clone())),
            Box::new(AmadeusSource::new(
                self.settings.amadeus_client_id.clone(),
                self.settings.amadeus_client_secret.clone(),
                self.settings.amadeus_base_url.clone(),
            )),
            Box::new(BrowserSource::new(
                None,
                std::path::PathBuf::from(&self.settings.data_dir).join("screenshots"),
            )),
        ]
    }
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AirportLookupParams {
    #[schemars(description = "IATA airport code, e.g. AKL")]
    pub code: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AirportSearchParams {
    #[schemars(description = "Free-text name/city query, e.g. 'Tokyo'")]
    pub query: String,
    #[schemars(description = "Maximum number of results (default 10)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct ConvertParams {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct ScrapeParams {
    #[schemars(description = "Origin IATA code")]
    pub origin: String,
    #[schemars(description = "Destination IATA code")]
    pub destination: String,
    #[schemars(description = "Departure date, YYYY-MM-DD")]
    pub departure_date: String,
    #[schemars(description = "Return date, YYYY-MM-DD, for round trips")]
    pub return_date: Option<String>,
    #[schemars(description = "ISO 4217 currency code (default NZD)")]
    pub currency: Option<String>,
}

#[tool(tool_box)]
impl WalkaboutServer {
    #[tool(description = "Look up an airport by its IATA code.")]
    async fn lookup_airport(&self, #[tool(aggr)] params: AirportLookupParams) -> String {
        match self.catalog.lookup(&params.code) {
            Some(airport) => serde_json::json!({
                "code": airport.code,
                "name": airport.name,
                "city": airport.city,
                "country": airport.country,
                "region": airport.region,
            })
            .to_string(),
            None => format!(r#"{{"error": "no airport found for {}"}}"#, params.code),
        }
    }

    #[tool(description = "Search airports by name or city substring.")]
    async fn search_airports(&self, #[tool(aggr)] params: AirportSearchParams) -> String {
        let limit = params.limit.unwrap_or(10);
        let results: Vec<_> = self
            .catalog
            .search(&params.query, limit)
            .into_iter()
            .map(|a| serde_json::json!({"code": a.code, "name": a.name, "city": a.city, "country": a.country}))
            .collect();
        serde_json::json!({ "results": results }).to_string()
    }

    #[tool(description = "Convert an amount between two ISO 4217 currency codes.")]
    async fn convert_currency(&self, #[tool(aggr)] params: ConvertParams) -> String {
        match self.currency.convert(params.amount, &params.from, &params.to).await {
            Some(value) => serde_json::json!({ "amount": value, "currency": params.to }).to_string(),
            None => format!(r#"{{"error": "no conversion rate available for {} -> {}"}}"#, params.from, params.to),
        }
    }

    #[tool(description = "Register a fixed-date search and run one scrape against it immediately.")]
    async fn scrape_once(&self, #[tool(aggr)] params: ScrapeParams) -> String {
        match self.run_scrape(params).await {
            Ok(summary) => summary,
            Err(err) => format!(r#"{{"error": "{err}"}}"#),
        }
    }
}

impl WalkaboutServer {
    async fn run_scrape(&self, params: ScrapeParams) -> Result<String> {
        let dep = chrono::NaiveDate::parse_from_str(&params.departure_date, "%Y-%m-%d")?;
        let ret = params
            .return_date
            .as_deref()
            .map(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()?;
        let trip_type = if ret.is_some() { TripType::RoundTrip } else { TripType::OneWay };
        let currency = params.currency.unwrap_or_else(|| "NZD".to_string());

        let def = SearchDefinition::new(
            0,
            &params.origin,
            &params.destination,
            trip_type,
            SearchDates::Fixed { departure_date_start: dep, departure_date_end: ret.unwrap_or(dep) },
            1,
            0,
            0,
            0,
            CabinClass::Economy,
            StopsFilter::Any,
            &currency,
        )?;
        let id = self.db.insert_search_definition(&def)?;

        let adapters = self.adapters();
        let service = ScrapingService::with_ai(
            self.db.clone(),
            walkabout::ai::AIService::new(self.settings.anthropic_api_key.clone()),
        );
        let run = service.run(id, &adapters).await?;

        Ok(serde_json::json!({
            "search_definition_id": id,
            "status": format!("{:?}", run.status),
            "deal": run.deal.map(|(price, analysis)| serde_json::json!({
                "price": price.price_per_passenger,
                "currency": price.currency,
                "is_deal": analysis.is_deal,
                "reason": analysis.reason,
            })),
            "ai_recommendation": run.ai_recommendation,
        })
        .to_string())
    }
}

#[tool(tool_box)]
impl ServerHandler for WalkaboutServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Airport lookup, currency conversion, and on-demand flight price scraping for Walkabout.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let settings = Settings::global();
    let db = Database::open(settings.database_url.trim_start_matches("sqlite://"))?;
    let server = WalkaboutServer::new(settings, db);
    let transport = stdio();

    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}
