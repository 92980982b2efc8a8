//! Amadeus Self-Service adapter (§4.B.3): OAuth2 client-credentials flow
//! with a token cache, flight-offers search, and ISO-8601 duration parsing.
//! Grounded on
//! `original_source/backend/app/services/flight_price_fetcher.py`'s Amadeus
//! branch.

use super::{parse_iso8601_duration_minutes, FetchOutcome, NormalizedPrice, SourceError, SourceResult};
use crate::url_builder::FlightUrlParams;
use crate::CabinClass;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct AmadeusSource {
    http: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusSource {
    pub fn new(client_id: Option<String>, client_secret: Option<String>, base_url: String) -> Self {
        Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build().expect("client builds"),
            client_id,
            client_secret,
            base_url,
            token: Mutex::new(None),
        }
    }

    fn cabin_param(cabin: CabinClass) -> &'static str {
        match cabin {
            CabinClass::Economy => "ECONOMY",
            CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        if let Some(cached) = self.token.lock().as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let client_id = self.client_id.as_ref().ok_or(SourceError::NotConfigured { source: "amadeus" })?;
        let client_secret = self.client_secret.as_ref().ok_or(SourceError::NotConfigured { source: "amadeus" })?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .timeout(Duration::from_secs(10))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Transient { source: "amadeus", message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(SourceError::Transient {
                source: "amadeus",
                message: format!("token request failed: HTTP {}", response.status()),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::BadResponse { source: "amadeus", message: e.to_string() })?;

        // Refresh 60s early so a request started right before expiry never
        // races the token's actual cutover.
        let expires_at = Utc::now() + chrono::Duration::seconds(token.expires_in - 60);
        *self.token.lock() = Some(CachedToken { access_token: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct FlightOffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
    dictionaries: Option<Dictionaries>,
}

#[derive(Debug, Deserialize)]
struct Dictionaries {
    #[serde(default)]
    carriers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FlightOffer {
    price: OfferPrice,
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    total: String,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    duration: Option<String>,
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(rename = "carrierCode")]
    carrier_code: String,
}

#[async_trait]
impl super::PriceSource for AmadeusSource {
    fn tag(&self) -> &'static str {
        "amadeus"
    }

    fn is_available(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    async fn fetch(&self, _search_definition_id: i64, params: &FlightUrlParams<'_>) -> SourceResult {
        let token = self.access_token().await?;

        let non_stop = matches!(params.stops_filter, crate::StopsFilter::Nonstop);
        let mut query = vec![
            ("originLocationCode".to_string(), params.origin.to_string()),
            ("destinationLocationCode".to_string(), params.destination.to_string()),
            ("departureDate".to_string(), params.departure_date.format("%Y-%m-%d").to_string()),
            ("adults".to_string(), params.adults.to_string()),
            ("travelClass".to_string(), Self::cabin_param(params.cabin_class).to_string()),
            ("currencyCode".to_string(), params.currency.to_string()),
            // Always sent explicitly — never omitted — per §4.B.3.
            ("nonStop".to_string(), non_stop.to_string()),
        ];
        if let Some(ret) = params.return_date {
            query.push(("returnDate".to_string(), ret.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .http
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Transient { source: "amadeus", message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(SourceError::Transient {
                source: "amadeus",
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: FlightOffersResponse = response
            .json()
            .await
            .map_err(|e| SourceError::BadResponse { source: "amadeus", message: e.to_string() })?;

        let carriers = body.dictionaries.map(|d| d.carriers).unwrap_or_default();

        let prices = body
            .data
            .iter()
            .filter_map(|offer| {
                let amount: f64 = offer.price.total.parse().ok()?;
                let first_itinerary = offer.itineraries.first()?;
                let stops = first_itinerary.segments.len() as i32 - 1;
                let airline = first_itinerary.segments.first().map(|s| {
                    carriers.get(&s.carrier_code).cloned().unwrap_or_else(|| s.carrier_code.clone())
                });
                let duration_minutes =
                    first_itinerary.duration.as_deref().and_then(parse_iso8601_duration_minutes);
                Some(NormalizedPrice {
                    amount,
                    currency: params.currency.to_string(),
                    airline,
                    stops: Some(stops.max(0)),
                    duration_minutes,
                    booking_url: None,
                    source_tag: "amadeus",
                    confidence: 1.0,
                })
            })
            .collect();

        Ok(FetchOutcome { prices, source_tag: "amadeus", price_insights: None })
    }
}
