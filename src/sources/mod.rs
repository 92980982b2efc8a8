//! Price Sources (§4.B): four interchangeable adapters behind one trait,
//! each producing a normalized price list. Grounded on
//! `original_source/backend/app/services/flight_price_fetcher.py` for the
//! shared retry/availability shape, and on the teacher's `client.rs` for the
//! `reqwest`-based HTTP plumbing style.

pub mod amadeus;
pub mod browser;
pub mod serpapi;
pub mod skyscanner;

use crate::models::FailureReason;
use crate::url_builder::FlightUrlParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One flight offer as returned by any adapter, before extraction-confidence
/// scoring (which only applies to the browser adapter's raw HTML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPrice {
    pub amount: f64,
    pub currency: String,
    pub airline: Option<String>,
    pub stops: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub booking_url: Option<String>,
    pub source_tag: &'static str,
    /// 1.0 for API adapters (authoritative data); set by the Extractor for
    /// the browser adapter.
    pub confidence: f64,
}

/// Summary stats surfaced by SerpAPI/Amadeus when present; not all adapters
/// populate this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceInsights {
    pub lowest_price: Option<f64>,
    pub price_level: Option<String>,
    pub typical_price_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub prices: Vec<NormalizedPrice>,
    pub source_tag: &'static str,
    pub price_insights: Option<PriceInsights>,
}

/// Adapter-local failure classification §7 kind 1/2/3 map onto this.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("{source} is not configured")]
    NotConfigured { source: &'static str },
    #[error("{source} request failed: {message}")]
    Transient { source: &'static str, message: String },
    #[error("{source} returned an unparsable response: {message}")]
    BadResponse { source: &'static str, message: String },
    /// The browser adapter's own classified failure (§4.E), carrying the
    /// artifact paths written for it. Other adapters never have a
    /// `FailureReason` of their own and fall back to `Unknown` at the
    /// fetcher/health-tracker boundary.
    #[error("{source} scrape failed: {reason:?}")]
    Classified {
        source: &'static str,
        reason: FailureReason,
        message: String,
        screenshot_path: Option<String>,
        html_snapshot_path: Option<String>,
    },
}

impl SourceError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, SourceError::NotConfigured { .. })
    }

    /// Classification to record on `ScrapeHealth` (§4.E/§7.3); `Unknown`
    /// with no artifacts for adapters that don't produce one of their own.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            SourceError::Classified { reason, .. } => *reason,
            _ => FailureReason::Unknown,
        }
    }

    pub fn screenshot_path(&self) -> Option<String> {
        match self {
            SourceError::Classified { screenshot_path, .. } => screenshot_path.clone(),
            _ => None,
        }
    }

    pub fn html_snapshot_path(&self) -> Option<String> {
        match self {
            SourceError::Classified { html_snapshot_path, .. } => html_snapshot_path.clone(),
            _ => None,
        }
    }
}

pub type SourceResult = Result<FetchOutcome, SourceError>;

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn tag(&self) -> &'static str;
    /// Driven by presence of keys/credentials; no network call.
    fn is_available(&self) -> bool;
    /// `search_definition_id` is carried through so the browser adapter can
    /// key its failure artifacts by the real search, not a placeholder.
    async fn fetch(&self, search_definition_id: i64, params: &FlightUrlParams<'_>) -> SourceResult;
    /// Retry budget for `fetch_with_retry`; adapters with a stricter
    /// upstream rate limit override this lower.
    fn max_retries(&self) -> u32 {
        3
    }
}

/// Wraps any adapter's `fetch` with exponential backoff + jitter (§4.B): base
/// 1s, factor 2, up to `adapter.max_retries()`. Breaks out immediately,
/// without retrying, on `NotConfigured`. Returns the number of HTTP-level
/// calls actually made, so callers can sum attempts across a cascade
/// (§8 scenario 4).
pub async fn fetch_with_retry(
    adapter: &dyn PriceSource,
    search_definition_id: i64,
    params: &FlightUrlParams<'_>,
) -> (SourceResult, u32) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match adapter.fetch(search_definition_id, params).await {
            Ok(outcome) => return (Ok(outcome), attempt),
            Err(err @ SourceError::NotConfigured { .. }) => return (Err(err), attempt),
            Err(err) => {
                if attempt > adapter.max_retries() {
                    return (Err(err), attempt);
                }
                let backoff_secs = 2f64.powi(attempt as i32 - 1);
                let jitter: f64 = rand::random::<f64>() * 0.25 * backoff_secs;
                tracing::warn!(
                    source = adapter.tag(),
                    attempt,
                    %err,
                    "retrying after backoff",
                );
                tokio::time::sleep(Duration::from_secs_f64(backoff_secs + jitter)).await;
            }
        }
    }
}

/// ISO-8601 duration (`PT12H30M`) to minutes, used by Amadeus and kept here
/// since Skyscanner/SerpAPI both sometimes echo the same format.
pub fn parse_iso8601_duration_minutes(s: &str) -> Option<i32> {
    let s = s.strip_prefix("PT")?;
    let mut minutes = 0i32;
    let mut number = String::new();
    for c in s.chars() {
        match c {
            '0'..='9' => number.push(c),
            'H' => {
                minutes += number.parse::<i32>().ok()? * 60;
                number.clear();
            }
            'M' => {
                minutes += number.parse::<i32>().ok()?;
                number.clear();
            }
            _ => return None,
        }
    }
    Some(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(parse_iso8601_duration_minutes("PT12H30M"), Some(750));
        assert_eq!(parse_iso8601_duration_minutes("PT45M"), Some(45));
        assert_eq!(parse_iso8601_duration_minutes("PT5H"), Some(300));
        assert_eq!(parse_iso8601_duration_minutes("garbage"), None);
    }
}
