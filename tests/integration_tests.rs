//! Integration tests for walkabout.
//!
//! These exercise the Scraping Service end to end against an in-memory
//! database and a stub `PriceSource`, rather than making live requests to
//! any upstream provider — matching §4.G's pipeline without depending on
//! network access or real credentials in CI.

use async_trait::async_trait;
use walkabout::db::Database;
use walkabout::health::HealthTracker;
use walkabout::models::{FailureReason, FlightPrice, SearchDates, SearchDefinition};
use walkabout::scraping_service::{ScrapeStatus, ScrapingService};
use walkabout::sources::{FetchOutcome, NormalizedPrice, PriceSource, SourceError, SourceResult};
use walkabout::url_builder::FlightUrlParams;
use walkabout::{CabinClass, StopsFilter, TripType};

struct StubPriceSource {
    prices: Vec<f64>,
}

#[async_trait]
impl PriceSource for StubPriceSource {
    fn tag(&self) -> &'static str {
        "serpapi"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn max_retries(&self) -> u32 {
        0
    }

    async fn fetch(&self, _search_definition_id: i64, _params: &FlightUrlParams<'_>) -> SourceResult {
        if self.prices.is_empty() {
            return Err(SourceError::Transient { source: self.tag(), message: "no prices".into() });
        }
        Ok(FetchOutcome {
            prices: self
                .prices
                .iter()
                .map(|amount| NormalizedPrice {
                    amount: *amount,
                    currency: "NZD".to_string(),
                    airline: Some("Air New Zealand".to_string()),
                    stops: Some(0),
                    duration_minutes: Some(720),
                    booking_url: None,
                    source_tag: "serpapi",
                    confidence: 1.0,
                })
                .collect(),
            source_tag: "serpapi",
            price_insights: None,
        })
    }
}

const DEPARTURE: &str = "2026-06-01";

fn fixed_date_definition(origin: &str, destination: &str) -> SearchDefinition {
    let departure = chrono::NaiveDate::parse_from_str(DEPARTURE, "%Y-%m-%d").unwrap();
    SearchDefinition::new(
        0,
        origin,
        destination,
        TripType::OneWay,
        SearchDates::Fixed { departure_date_start: departure, departure_date_end: departure },
        1,
        0,
        0,
        0,
        CabinClass::Economy,
        StopsFilter::Any,
        "NZD",
    )
    .unwrap()
}

#[tokio::test]
async fn scraping_a_search_stores_prices_and_surfaces_the_cheapest_as_a_deal() {
    let db = Database::open_in_memory().unwrap();
    let def = fixed_date_definition("AKL", "NRT");
    let id = db.insert_search_definition(&def).unwrap();

    // Seed 30 days of stable history so a $450 fare is actually remarkable.
    let departure = chrono::NaiveDate::parse_from_str(DEPARTURE, "%Y-%m-%d").unwrap();
    for day in 0..30 {
        let mut row =
            FlightPrice::new(id, departure, None, 1200.0, 1, "NZD", TripType::OneWay, "serpapi", 1.0).unwrap();
        row.scraped_at = chrono::Utc::now() - chrono::Duration::days(day);
        db.insert_flight_price(&row).unwrap();
    }

    let adapters: Vec<Box<dyn PriceSource>> = vec![Box::new(StubPriceSource { prices: vec![450.0] })];
    let service = ScrapingService::new(db);
    let run = service.run(id, &adapters).await.unwrap();

    match run.status {
        ScrapeStatus::Ok { stored, .. } => assert_eq!(stored, 1),
        other => panic!("expected Ok status, got {other:?}"),
    }
    let (price, analysis) = run.deal.expect("a price well below 30 days of $1200 history should be a deal");
    assert_eq!(price.price_per_passenger, 450.0);
    assert!(analysis.is_deal);
}

#[tokio::test]
async fn blocked_search_after_circuit_open_never_calls_the_adapter() {
    let db = Database::open_in_memory().unwrap();
    let def = fixed_date_definition("AKL", "SYD");
    let id = db.insert_search_definition(&def).unwrap();

    let health_tracker = HealthTracker::new(db.clone());
    for _ in 0..5 {
        health_tracker.record_failure(id, FailureReason::Unknown, None, None, None).unwrap();
    }

    let adapters: Vec<Box<dyn PriceSource>> = vec![Box::new(StubPriceSource { prices: vec![] })];
    let service = ScrapingService::new(db);
    let run = service.run(id, &adapters).await.unwrap();
    assert_eq!(run.status, ScrapeStatus::Blocked);
}
