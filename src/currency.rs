//! Currency Service: live rates with a 6-hour TTL cache, falling back to a
//! hardcoded table when the upstream call fails or hasn't been configured.
//!
//! Grounded on `original_source/backend/app/services/currency.py`; the HTTP
//! idiom (a plain `reqwest::Client` with a short fixed timeout) follows
//! `client.rs`'s `FlightClient`.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;

const FALLBACK_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("NZD", 1.67),
    ("AUD", 1.53),
    ("CAD", 1.36),
    ("SGD", 1.34),
    ("JPY", 149.5),
    ("CHF", 0.88),
    ("HKD", 7.82),
    ("CNY", 7.24),
    ("KRW", 1320.0),
    ("THB", 35.5),
    ("MYR", 4.47),
    ("PHP", 56.2),
    ("INR", 83.1),
    ("IDR", 15800.0),
    ("VND", 24500.0),
    ("MXN", 17.1),
    ("BRL", 4.97),
    ("ZAR", 18.9),
    ("AED", 3.67),
    ("QAR", 3.64),
    ("FJD", 2.25),
];

const NO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND", "IDR"];

fn symbol_for(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "NZD" => Some("NZ$"),
        "AUD" => Some("A$"),
        "CAD" => Some("C$"),
        "JPY" => Some("¥"),
        "CNY" => Some("¥"),
        "SGD" => Some("S$"),
        "HKD" => Some("HK$"),
        _ => None,
    }
}

fn fallback_rates() -> HashMap<String, f64> {
    FALLBACK_RATES.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

struct CachedRates {
    base: String,
    rates: HashMap<String, f64>,
    fetched_at: DateTime<Utc>,
}

/// Shared across the process; `get_rates` is safe to call concurrently and
/// only the first caller past TTL expiry pays the network round trip.
pub struct CurrencyService {
    http: Client,
    cache: RwLock<Option<CachedRates>>,
    cache_ttl: Duration,
}

impl CurrencyService {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client with no custom TLS config should always build"),
            cache: RwLock::new(None),
            cache_ttl: Duration::hours(6),
        }
    }

    pub async fn get_rates(&self, base: &str) -> HashMap<String, f64> {
        if let Some(cached) = self.cache.read().as_ref() {
            if cached.base == base && Utc::now() - cached.fetched_at < self.cache_ttl {
                return cached.rates.clone();
            }
        }

        match self.fetch_live_rates(base).await {
            Ok(rates) => {
                *self.cache.write() =
                    Some(CachedRates { base: base.to_string(), rates: rates.clone(), fetched_at: Utc::now() });
                rates
            }
            Err(err) => {
                tracing::warn!(base, %err, "failed to fetch exchange rates, using fallback");
                self.fallback_rates_for(base)
            }
        }
    }

    async fn fetch_live_rates(&self, base: &str) -> Result<HashMap<String, f64>> {
        #[derive(serde::Deserialize)]
        struct RatesResponse {
            rates: HashMap<String, f64>,
        }
        let url = format!("https://api.exchangerate-api.com/v4/latest/{base}");
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body: RatesResponse = response.json().await?;
        Ok(body.rates)
    }

    fn fallback_rates_for(&self, base: &str) -> HashMap<String, f64> {
        let rates = fallback_rates();
        if base == "USD" {
            return rates;
        }
        let usd_to_base = rates.get(base).copied().unwrap_or(1.0);
        rates.into_iter().map(|(k, v)| (k, v / usd_to_base)).collect()
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(amount);
        }
        let rates = self.get_rates("USD").await;
        Self::convert_via(amount, from, to, &rates)
    }

    /// Synchronous conversion against the hardcoded table only — used where
    /// an async context isn't available and a live rate isn't worth the
    /// round trip (e.g. RSS deal ingestion, out of this crate's core).
    pub fn convert_sync(amount: f64, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(amount);
        }
        Self::convert_via(amount, from, to, &fallback_rates())
    }

    fn convert_via(amount: f64, from: &str, to: &str, rates: &HashMap<String, f64>) -> Option<f64> {
        let from_rate = rates.get(&from.to_uppercase()).copied()?;
        let to_rate = rates.get(&to.to_uppercase()).copied()?;
        let usd_amount = amount / from_rate;
        Some((usd_amount * to_rate * 100.0).round() / 100.0)
    }

    pub fn format_price(amount: f64, currency: &str, show_symbol: bool) -> String {
        let formatted = if NO_DECIMAL_CURRENCIES.contains(&currency) {
            format_with_thousands(amount.round() as i64)
        } else {
            let whole = amount.trunc() as i64;
            let cents = ((amount - whole as f64).abs() * 100.0).round() as i64;
            format!("{}.{:02}", format_with_thousands(whole), cents)
        };
        if show_symbol {
            match symbol_for(currency) {
                Some(symbol) => format!("{symbol}{formatted}"),
                None => format!("{currency} {formatted}"),
            }
        } else {
            formatted
        }
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new()
    }
}

fn format_with_thousands(n: i64) -> String {
    let s = n.abs().to_string();
    let mut out = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    let digits: String = out.chars().rev().collect();
    if n < 0 {
        format!("-{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_sync_same_currency_is_identity() {
        assert_eq!(CurrencyService::convert_sync(1200.0, "NZD", "NZD"), Some(1200.0));
    }

    #[test]
    fn convert_sync_unknown_currency_returns_none() {
        assert_eq!(CurrencyService::convert_sync(100.0, "NZD", "XYZ"), None);
    }

    #[test]
    fn convert_sync_round_trips_through_usd() {
        let converted = CurrencyService::convert_sync(167.0, "NZD", "USD").unwrap();
        assert!((converted - 100.0).abs() < 0.5);
    }

    #[test]
    fn format_price_uses_currency_symbol() {
        assert_eq!(CurrencyService::format_price(1234.5, "NZD", true), "NZ$1,234.50");
    }

    #[test]
    fn format_price_drops_decimals_for_yen() {
        assert_eq!(CurrencyService::format_price(150000.0, "JPY", true), "¥150,000");
    }
}
