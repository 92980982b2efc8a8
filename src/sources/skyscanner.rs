//! Skyscanner adapter (§4.B.2), reached via a RapidAPI gateway. Grounded on
//! `original_source/backend/app/services/flight_price_fetcher.py`'s
//! Skyscanner branch.

use super::{FetchOutcome, NormalizedPrice, SourceError, SourceResult};
use crate::url_builder::FlightUrlParams;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const RAPIDAPI_HOST: &str = "skyscanner80.p.rapidapi.com";

pub struct SkyscannerSource {
    http: Client,
    rapidapi_key: Option<String>,
}

impl SkyscannerSource {
    pub fn new(rapidapi_key: Option<String>) -> Self {
        Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build().expect("client builds"),
            rapidapi_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SkyscannerResponse {
    data: SkyscannerData,
}

#[derive(Debug, Deserialize)]
struct SkyscannerData {
    itineraries: SkyscannerItineraries,
}

#[derive(Debug, Deserialize)]
struct SkyscannerItineraries {
    #[serde(default)]
    results: Vec<SkyscannerResult>,
}

#[derive(Debug, Deserialize)]
struct SkyscannerResult {
    #[serde(default)]
    pricing_options: Vec<SkyscannerPricingOption>,
    legs: Vec<SkyscannerLeg>,
}

#[derive(Debug, Deserialize)]
struct SkyscannerPricingOption {
    price: SkyscannerPrice,
}

#[derive(Debug, Deserialize)]
struct SkyscannerPrice {
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct SkyscannerLeg {
    carriers: SkyscannerCarriers,
    stop_count: Option<i32>,
    duration_in_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SkyscannerCarriers {
    #[serde(default)]
    marketing: Vec<SkyscannerCarrier>,
}

#[derive(Debug, Deserialize)]
struct SkyscannerCarrier {
    name: String,
}

#[async_trait]
impl super::PriceSource for SkyscannerSource {
    fn tag(&self) -> &'static str {
        "skyscanner"
    }

    fn is_available(&self) -> bool {
        self.rapidapi_key.is_some()
    }

    async fn fetch(&self, _search_definition_id: i64, params: &FlightUrlParams<'_>) -> SourceResult {
        let key = self.rapidapi_key.as_ref().ok_or(SourceError::NotConfigured { source: "skyscanner" })?;

        let mut query = vec![
            ("originSkyId".to_string(), params.origin.to_string()),
            ("destinationSkyId".to_string(), params.destination.to_string()),
            ("date".to_string(), params.departure_date.format("%Y-%m-%d").to_string()),
            ("adults".to_string(), params.adults.to_string()),
            ("currency".to_string(), params.currency.to_string()),
        ];
        if let Some(ret) = params.return_date {
            query.push(("returnDate".to_string(), ret.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .http
            .get(format!("https://{RAPIDAPI_HOST}/api/v1/flights/searchFlights"))
            .header("X-RapidAPI-Key", key)
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Transient { source: "skyscanner", message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(SourceError::Transient {
                source: "skyscanner",
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: SkyscannerResponse = response
            .json()
            .await
            .map_err(|e| SourceError::BadResponse { source: "skyscanner", message: e.to_string() })?;

        let prices = body
            .data
            .itineraries
            .results
            .iter()
            .filter_map(|result| {
                let option = result.pricing_options.first()?;
                let first_leg = result.legs.first();
                Some(NormalizedPrice {
                    amount: option.price.amount,
                    currency: params.currency.to_string(),
                    airline: first_leg.and_then(|l| l.carriers.marketing.first()).map(|c| c.name.clone()),
                    stops: first_leg.and_then(|l| l.stop_count),
                    duration_minutes: first_leg.and_then(|l| l.duration_in_minutes),
                    booking_url: None,
                    source_tag: "skyscanner",
                    confidence: 1.0,
                })
            })
            .collect();

        Ok(FetchOutcome { prices, source_tag: "skyscanner", price_insights: None })
    }
}
