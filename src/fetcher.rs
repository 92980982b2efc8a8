//! Price Fetcher (§4.D): the orchestrator over the four adapters in
//! `sources::`. Grounded on
//! `original_source/backend/app/services/flight_price_fetcher.py`'s cascade
//! logic.

use crate::models::FailureReason;
use crate::sources::{fetch_with_retry, FetchOutcome, PriceSource, SourceError};
use crate::url_builder::FlightUrlParams;

/// Fixed default cascade order when no (usable) preference is given.
const DEFAULT_ORDER: &[&str] = &["serpapi", "skyscanner", "amadeus", "browser"];

pub struct FetchRequest<'a> {
    pub search_definition_id: i64,
    pub params: FlightUrlParams<'a>,
    /// `"auto"`, empty, or any tag naming an adapter whose credentials are
    /// missing are all treated as "no preference" (§4.D step 1).
    pub preferred_source: Option<&'a str>,
}

#[derive(Debug)]
pub struct FetchSuccess {
    pub outcome: FetchOutcome,
    /// True when a source other than the first candidate tried produced the
    /// result.
    pub fallback_used: bool,
    /// Sum of HTTP-level attempts actually made across every adapter tried
    /// (§8 scenario 4: SerpAPI fails twice, Skyscanner succeeds once →
    /// `attempts = 3`), matching `flight_price_fetcher.py`'s
    /// `total_attempts += result.attempts`.
    pub attempts: usize,
}

#[derive(Debug)]
pub struct FetchFailure {
    pub last_source: String,
    pub message: String,
    pub attempts: usize,
    /// Classified reason to record on `ScrapeHealth` (§4.E/§7.3); `Unknown`
    /// unless the failing adapter produced a classified error (currently
    /// only the browser adapter does).
    pub reason: FailureReason,
    pub screenshot_path: Option<String>,
    pub html_snapshot_path: Option<String>,
}

/// Builds `[preferred, …others in fixed default order]`, deduplicated.
/// Unavailable adapters stay in the returned order (so preference ordering
/// is stable) but `fetch` skips invoking them and they don't contribute to
/// `attempts`, which only counts adapters actually called.
fn ordered_sources<'a>(
    adapters: &'a [Box<dyn PriceSource>],
    preferred: Option<&str>,
) -> Vec<&'a dyn PriceSource> {
    let preferred_tag = preferred.filter(|p| !p.is_empty() && *p != "auto").and_then(|p| {
        adapters.iter().find(|a| a.tag() == p && a.is_available()).map(|a| a.as_ref())
    });

    let mut order: Vec<&dyn PriceSource> = Vec::new();
    if let Some(p) = preferred_tag {
        order.push(p);
    }
    for tag in DEFAULT_ORDER {
        if let Some(adapter) = adapters.iter().find(|a| a.tag() == *tag) {
            if preferred_tag.map(|p| p.tag() != *tag).unwrap_or(true) {
                order.push(adapter.as_ref());
            }
        }
    }
    order
}

pub async fn fetch(
    adapters: &[Box<dyn PriceSource>],
    request: &FetchRequest<'_>,
) -> Result<FetchSuccess, FetchFailure> {
    let order = ordered_sources(adapters, request.preferred_source);

    let mut attempts = 0usize;
    let mut last_error: Option<SourceError> = None;
    let mut last_source = "none".to_string();
    let mut any_invoked = false;

    for (index, adapter) in order.iter().enumerate() {
        if !adapter.is_available() {
            continue;
        }
        any_invoked = true;
        let (result, calls) =
            fetch_with_retry(adapter.as_ref(), request.search_definition_id, &request.params).await;
        attempts += calls as usize;
        match result {
            Ok(outcome) => {
                return Ok(FetchSuccess { outcome, fallback_used: index > 0, attempts });
            }
            Err(err) => {
                last_source = adapter.tag().to_string();
                last_error = Some(err);
            }
        }
    }
    if !any_invoked {
        attempts = order.len();
    }

    Err(FetchFailure {
        last_source,
        message: last_error.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "no adapters available".to_string()),
        attempts,
        reason: last_error.as_ref().map(|e| e.failure_reason()).unwrap_or(FailureReason::Unknown),
        screenshot_path: last_error.as_ref().and_then(|e| e.screenshot_path()),
        html_snapshot_path: last_error.as_ref().and_then(|e| e.html_snapshot_path()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FetchOutcome, SourceResult};
    use crate::{CabinClass, StopsFilter};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct StubSource {
        tag: &'static str,
        available: bool,
        result: Option<FetchOutcome>,
        retries: u32,
    }

    #[async_trait]
    impl PriceSource for StubSource {
        fn tag(&self) -> &'static str {
            self.tag
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn max_retries(&self) -> u32 {
            self.retries
        }
        async fn fetch(&self, _search_definition_id: i64, _: &FlightUrlParams<'_>) -> SourceResult {
            self.result
                .clone()
                .ok_or(SourceError::Transient { source: self.tag, message: "stub failure".into() })
        }
    }

    fn params() -> FlightUrlParams<'static> {
        FlightUrlParams {
            origin: "AKL",
            destination: "NRT",
            departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: None,
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
            cabin_class: CabinClass::Economy,
            stops_filter: StopsFilter::Any,
            currency: "NZD",
        }
    }

    #[tokio::test]
    async fn falls_through_unavailable_preferred_source_silently() {
        let adapters: Vec<Box<dyn PriceSource>> = vec![
            Box::new(StubSource { tag: "serpapi", available: false, result: None, retries: 0 }),
            Box::new(StubSource {
                tag: "skyscanner",
                available: true,
                result: Some(FetchOutcome { prices: vec![], source_tag: "skyscanner", price_insights: None }),
                retries: 0,
            }),
        ];
        let request =
            FetchRequest { search_definition_id: 1, params: params(), preferred_source: Some("serpapi") };
        let result = fetch(&adapters, &request).await.unwrap();
        assert_eq!(result.outcome.source_tag, "skyscanner");
        assert!(result.fallback_used);
    }

    #[tokio::test]
    async fn auto_preference_falls_to_default_order() {
        let adapters: Vec<Box<dyn PriceSource>> = vec![Box::new(StubSource {
            tag: "serpapi",
            available: true,
            result: Some(FetchOutcome { prices: vec![], source_tag: "serpapi", price_insights: None }),
            retries: 0,
        })];
        let request = FetchRequest { search_definition_id: 1, params: params(), preferred_source: Some("auto") };
        let result = fetch(&adapters, &request).await.unwrap();
        assert!(!result.fallback_used);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_last_adapter_error() {
        let adapters: Vec<Box<dyn PriceSource>> =
            vec![Box::new(StubSource { tag: "serpapi", available: true, result: None, retries: 0 })];
        let request = FetchRequest { search_definition_id: 1, params: params(), preferred_source: None };
        let err = fetch(&adapters, &request).await.unwrap_err();
        assert_eq!(err.last_source, "serpapi");
    }

    /// §8 scenario 4: SerpAPI fails twice (its one retry is exhausted),
    /// Skyscanner then succeeds on the first call — total attempts = 3.
    #[tokio::test]
    async fn attempts_sum_http_level_calls_across_the_cascade() {
        let adapters: Vec<Box<dyn PriceSource>> = vec![
            Box::new(StubSource { tag: "serpapi", available: true, result: None, retries: 1 }),
            Box::new(StubSource {
                tag: "skyscanner",
                available: true,
                result: Some(FetchOutcome { prices: vec![], source_tag: "skyscanner", price_insights: None }),
                retries: 0,
            }),
        ];
        let request = FetchRequest { search_definition_id: 1, params: params(), preferred_source: None };
        let result = fetch(&adapters, &request).await.unwrap();
        assert_eq!(result.attempts, 3);
        assert!(result.fallback_used);
    }
}
