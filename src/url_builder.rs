//! Canonical Google Flights URL builder (§6): the single place every
//! consumer — headless-browser adapter, booking links, trip-plan search —
//! turns a [`crate::models::search_definition::SearchDefinition`]-shaped
//! request into a URL.
//!
//! Grounded on `original_source/backend/app/utils/template_helpers.py`'s
//! `build_google_flights_url`. Filters are passed as a natural-language hint
//! in `q=` since Google Flights parses NL queries server-side; this is
//! best-effort for the scraper, not authoritative filtering.

use crate::{CabinClass, StopsFilter};
use chrono::NaiveDate;

pub struct FlightUrlParams<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: i32,
    pub children: i32,
    pub infants_in_seat: i32,
    pub infants_on_lap: i32,
    pub cabin_class: CabinClass,
    pub stops_filter: StopsFilter,
    pub currency: &'a str,
}

/// Literal `gl=nz` — distinct from the SerpAPI adapter's per-origin
/// `gl` lookup table in `sources::serpapi` (DESIGN.md Open Question 2).
pub fn build_google_flights_url(params: &FlightUrlParams) -> String {
    let base = "https://www.google.com/travel/flights";
    let dep_str = params.departure_date.format("%Y-%m-%d").to_string();

    let mut query = format!("Flights from {} to {} on {}", params.origin, params.destination, dep_str);

    if let Some(ret) = params.return_date {
        query.push_str(&format!(" returning {}", ret.format("%Y-%m-%d")));
    }

    match params.cabin_class {
        CabinClass::Business => query.push_str(" business class"),
        CabinClass::First => query.push_str(" first class"),
        CabinClass::PremiumEconomy => query.push_str(" premium economy"),
        CabinClass::Economy => {}
    }

    match params.stops_filter {
        StopsFilter::Nonstop => query.push_str(" nonstop"),
        StopsFilter::OneStop => query.push_str(" 1 stop or fewer"),
        StopsFilter::Any | StopsFilter::TwoPlus => {}
    }

    let total_passengers = params.adults + params.children + params.infants_in_seat + params.infants_on_lap;
    if total_passengers > 1 {
        let mut parts = Vec::new();
        if params.adults > 1 {
            parts.push(format!("{} adults", params.adults));
        }
        if params.children > 0 {
            parts.push(format!("{} {}", params.children, if params.children == 1 { "child" } else { "children" }));
        }
        let infant_total = params.infants_in_seat + params.infants_on_lap;
        if infant_total > 0 {
            parts.push(format!("{} {}", infant_total, if infant_total == 1 { "infant" } else { "infants" }));
        }
        if !parts.is_empty() {
            query.push(' ');
            query.push_str(&parts.join(" "));
        }
    }

    let encoded_query: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();

    format!("{base}?q={encoded_query}&curr={}&hl=en&gl=nz", params.currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_single_passenger_economy_url() {
        let url = build_google_flights_url(&FlightUrlParams {
            origin: "AKL",
            destination: "NRT",
            departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()),
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
            cabin_class: CabinClass::Economy,
            stops_filter: StopsFilter::Any,
            currency: "NZD",
        });
        assert!(url.starts_with("https://www.google.com/travel/flights?q="));
        assert!(url.contains("&curr=NZD&hl=en&gl=nz"));
        assert!(!url.contains("class"));
    }

    #[test]
    fn adds_cabin_and_stops_hints_and_passenger_counts() {
        let url = build_google_flights_url(&FlightUrlParams {
            origin: "AKL",
            destination: "SYD",
            departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: None,
            adults: 2,
            children: 1,
            infants_in_seat: 1,
            infants_on_lap: 0,
            cabin_class: CabinClass::Business,
            stops_filter: StopsFilter::Nonstop,
            currency: "AUD",
        });
        assert!(url.contains("business+class"));
        assert!(url.contains("nonstop"));
        assert!(url.contains("2+adults"));
        assert!(url.contains("1+child"));
        assert!(url.contains("1+infant"));
        assert!(url.contains("curr=AUD"));
    }
}
