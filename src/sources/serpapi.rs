//! SerpAPI adapter (§4.B.1): a Google Flights proxy. Grounded on
//! `original_source/backend/app/services/flight_price_fetcher.py`'s SerpAPI
//! branch; HTTP client style on the teacher's `client.rs::FlightClient`.

use super::{FetchOutcome, NormalizedPrice, PriceInsights, SourceError, SourceResult};
use crate::url_builder::FlightUrlParams;
use crate::{CabinClass, StopsFilter};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub struct SerpApiSource {
    http: Client,
    api_key: Option<String>,
}

/// Country-of-sale selected per origin (distinct from the URL builder's
/// fixed `gl=nz` literal — DESIGN.md Open Question 2).
fn gl_for_origin(origin: &str) -> &'static str {
    match origin {
        "AKL" | "WLG" | "CHC" | "ZQN" | "DUD" => "nz",
        "SYD" | "MEL" | "BNE" | "PER" | "ADL" => "au",
        _ => "us",
    }
}

impl SerpApiSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build().expect("client builds"),
            api_key,
        }
    }

    fn cabin_code(cabin: CabinClass) -> u8 {
        match cabin {
            CabinClass::Economy => 1,
            CabinClass::PremiumEconomy => 2,
            CabinClass::Business => 3,
            CabinClass::First => 4,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    best_flights: Vec<SerpApiItinerary>,
    #[serde(default)]
    other_flights: Vec<SerpApiItinerary>,
    price_insights: Option<SerpApiPriceInsights>,
}

#[derive(Debug, Deserialize)]
struct SerpApiItinerary {
    flights: Vec<SerpApiLeg>,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct SerpApiLeg {
    airline: Option<String>,
    duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SerpApiPriceInsights {
    lowest_price: Option<f64>,
    price_level: Option<String>,
    typical_price_range: Option<Vec<f64>>,
}

#[async_trait]
impl super::PriceSource for SerpApiSource {
    fn tag(&self) -> &'static str {
        "serpapi"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, _search_definition_id: i64, params: &FlightUrlParams<'_>) -> SourceResult {
        let api_key = self.api_key.as_ref().ok_or(SourceError::NotConfigured { source: "serpapi" })?;

        let mut query = vec![
            ("engine".to_string(), "google_flights".to_string()),
            ("departure_id".to_string(), params.origin.to_string()),
            ("arrival_id".to_string(), params.destination.to_string()),
            ("outbound_date".to_string(), params.departure_date.format("%Y-%m-%d").to_string()),
            ("adults".to_string(), params.adults.to_string()),
            ("children".to_string(), params.children.to_string()),
            ("travel_class".to_string(), Self::cabin_code(params.cabin_class).to_string()),
            ("currency".to_string(), params.currency.to_string()),
            ("hl".to_string(), "en".to_string()),
            ("stops".to_string(), params.stops_filter.serpapi_code().to_string()),
            ("deep_search".to_string(), "true".to_string()),
            ("gl".to_string(), gl_for_origin(params.origin).to_string()),
            ("api_key".to_string(), api_key.clone()),
        ];
        if let Some(ret) = params.return_date {
            query.push(("return_date".to_string(), ret.format("%Y-%m-%d").to_string()));
        }
        let infants = params.infants_in_seat + params.infants_on_lap;
        if infants > 0 {
            query.push(("infants_in_seat".to_string(), params.infants_in_seat.to_string()));
            query.push(("infants_on_lap".to_string(), params.infants_on_lap.to_string()));
        }

        let response = self
            .http
            .get("https://serpapi.com/search")
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Transient { source: "serpapi", message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(SourceError::Transient {
                source: "serpapi",
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| SourceError::BadResponse { source: "serpapi", message: e.to_string() })?;

        let prices = body
            .best_flights
            .iter()
            .chain(body.other_flights.iter())
            .map(|itinerary| NormalizedPrice {
                amount: itinerary.price,
                currency: params.currency.to_string(),
                airline: itinerary.flights.first().and_then(|l| l.airline.clone()),
                stops: Some((itinerary.flights.len() as i32 - 1).max(0)),
                duration_minutes: itinerary.flights.iter().filter_map(|l| l.duration).reduce(|a, b| a + b),
                booking_url: None,
                source_tag: "serpapi",
                confidence: 1.0,
            })
            .collect();

        let price_insights = body.price_insights.map(|pi| PriceInsights {
            lowest_price: pi.lowest_price,
            price_level: pi.price_level,
            typical_price_range: pi
                .typical_price_range
                .filter(|r| r.len() == 2)
                .map(|r| (r[0], r[1])),
        });

        Ok(FetchOutcome { prices, source_tag: "serpapi", price_insights })
    }
}
