//! # Walkabout
//!
//! A self-hosted flight-deal aggregator and price-history monitor. It runs a
//! periodic scraping engine over a cascade of paid flight-search APIs with a
//! headless-browser extractor as a last resort, classifies every observed
//! price against that search's own history using robust statistics, and
//! drives a trip-plan matcher and a notifier off the result.

pub mod ai;
pub mod config;
pub mod db;
pub mod models;
pub mod airports;
pub mod url_builder;
pub mod currency;
pub mod extractor;
pub mod sources;
pub mod fetcher;
pub mod health;
pub mod analyzer;
pub mod scraping_service;
pub mod trip_search;
pub mod trip_matcher;
pub mod scheduler;
pub mod notifier;

use std::str::FromStr;
use thiserror::Error;

/// Crate-wide error type. Each component that needs a distinct failure mode
/// gets its own variant, the way the teacher's `FlightError` separates
/// HTTP/parse/db/cache failures instead of boxing a `dyn Error`.
#[derive(Error, Debug)]
pub enum WalkaboutError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTML parsing failed: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("airport not found: {0}")]
    AirportNotFound(String),

    #[error("invalid IATA code: {0}")]
    InvalidIata(String),

    #[error("invalid search definition: {0}")]
    InvalidSearchDefinition(String),

    #[error("price source {source} unavailable")]
    SourceUnavailable { source: &'static str },

    #[error("all price sources exhausted, last error from {last_source}: {message}")]
    SourcesExhausted { last_source: String, message: String },

    #[error("scrape circuit open for search {search_definition_id}")]
    CircuitOpen { search_definition_id: i64 },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, WalkaboutError>;

/// Trip type, shared by `SearchDefinition` and `TripPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    RoundTrip,
    OneWay,
}

impl FromStr for TripType {
    type Err = WalkaboutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "round-trip" | "roundtrip" | "round_trip" => Ok(TripType::RoundTrip),
            "one-way" | "oneway" | "one_way" => Ok(TripType::OneWay),
            _ => Err(WalkaboutError::Parse(format!("invalid trip type: {s}"))),
        }
    }
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TripType::RoundTrip => "round_trip",
            TripType::OneWay => "one_way",
        };
        write!(f, "{s}")
    }
}

/// Cabin class, shared across search definitions, trip plans, and deals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl FromStr for CabinClass {
    type Err = WalkaboutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium-economy" | "premium_economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(WalkaboutError::Parse(format!("invalid cabin class: {s}"))),
        }
    }
}

impl std::fmt::Display for CabinClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium_economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        };
        write!(f, "{s}")
    }
}

/// Stops filter applied to a search definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopsFilter {
    Any,
    Nonstop,
    OneStop,
    TwoPlus,
}

impl StopsFilter {
    /// The SerpAPI `stops` code for this filter (§4.B.1).
    pub fn serpapi_code(&self) -> u8 {
        match self {
            StopsFilter::Any => 0,
            StopsFilter::Nonstop => 1,
            StopsFilter::OneStop => 2,
            StopsFilter::TwoPlus => 3,
        }
    }
}

impl FromStr for StopsFilter {
    type Err = WalkaboutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "any" => Ok(StopsFilter::Any),
            "nonstop" | "non_stop" => Ok(StopsFilter::Nonstop),
            "one_stop" | "one-stop" => Ok(StopsFilter::OneStop),
            "two_plus" | "two-plus" => Ok(StopsFilter::TwoPlus),
            _ => Err(WalkaboutError::Parse(format!("invalid stops filter: {s}"))),
        }
    }
}

impl std::fmt::Display for StopsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopsFilter::Any => "any",
            StopsFilter::Nonstop => "nonstop",
            StopsFilter::OneStop => "one_stop",
            StopsFilter::TwoPlus => "two_plus",
        };
        write!(f, "{s}")
    }
}

/// Passenger configuration, carried over from the teacher crate verbatim
/// (the field set already matches `SearchDefinition`'s passenger columns).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Passengers {
    pub adults: i32,
    pub children: i32,
    pub infants_in_seat: i32,
    pub infants_on_lap: i32,
}

impl Passengers {
    pub fn total(&self) -> i32 {
        self.adults + self.children + self.infants_in_seat + self.infants_on_lap
    }
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_type_parsing() {
        assert_eq!("round-trip".parse::<TripType>().unwrap(), TripType::RoundTrip);
        assert_eq!("one_way".parse::<TripType>().unwrap(), TripType::OneWay);
        assert!("invalid".parse::<TripType>().is_err());
    }

    #[test]
    fn cabin_class_parsing() {
        assert_eq!("premium-economy".parse::<CabinClass>().unwrap(), CabinClass::PremiumEconomy);
        assert!("invalid".parse::<CabinClass>().is_err());
    }

    #[test]
    fn stops_filter_serpapi_codes() {
        assert_eq!(StopsFilter::Any.serpapi_code(), 0);
        assert_eq!(StopsFilter::TwoPlus.serpapi_code(), 3);
    }

    #[test]
    fn passengers_default() {
        let p = Passengers::default();
        assert_eq!(p.adults, 1);
        assert_eq!(p.total(), 1);
    }
}
