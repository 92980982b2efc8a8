//! Scraping Service (§4.G): the per-search orchestration that ties the
//! circuit breaker, date sampler, Price Fetcher, confidence gate, anomaly
//! guard, and Price Analyzer together. Grounded on
//! `original_source/backend/app/services/scraping_service.py`'s pipeline
//! shape; the MD5 rolling-horizon sampler is reproduced exactly (§4.G.3) so
//! results stay deterministic for a given (search_id, day).

use crate::ai::AIService;
use crate::analyzer::{self, AnalysisResult};
use crate::db::Database;
use crate::fetcher::{self, FetchRequest};
use crate::health::HealthTracker;
use crate::models::{FlightPrice, SearchDates, SearchDefinition};
use crate::sources::PriceSource;
use crate::url_builder::FlightUrlParams;
use crate::Result;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tracing::{info, warn};

/// Prices below this are dropped entirely and never stored (§4.G.5).
pub const STORE_MIN: f64 = 0.5;
/// Prices stored but excluded from deal analysis below this (§4.G.5).
pub const DEAL_MIN: f64 = 0.6;
/// Anomaly guard (§4.G.6): price more than this percent above the 30-day
/// median is flagged suspicious.
const ANOMALY_ABOVE_PCT: f64 = 300.0;
/// Anomaly guard: price below this fraction of the 30-day median is flagged
/// suspicious.
const ANOMALY_BELOW_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeStatus {
    Ok { stored: usize, dropped_low_confidence: usize },
    Blocked,
    FetchFailed { message: String },
}

pub struct ScrapeRun {
    pub status: ScrapeStatus,
    pub deal: Option<(FlightPrice, AnalysisResult)>,
    /// Best-effort AI-generated one-liner about the deal (§6); never
    /// consulted by the analyzer, absent whenever AI isn't configured.
    pub ai_recommendation: Option<String>,
}

pub struct ScrapingService {
    db: Database,
    health: HealthTracker,
    ai: Option<AIService>,
}

impl ScrapingService {
    pub fn new(db: Database) -> Self {
        let health = HealthTracker::new(db.clone());
        Self { db, health, ai: None }
    }

    /// Same as `new`, but enables the optional AI enrichment step (§6's
    /// `AIService.complete`) for deals this service finds.
    pub fn with_ai(db: Database, ai: AIService) -> Self {
        let health = HealthTracker::new(db.clone());
        Self { db, health, ai: Some(ai) }
    }

    pub async fn run(
        &self,
        search_definition_id: i64,
        adapters: &[Box<dyn PriceSource>],
    ) -> Result<ScrapeRun> {
        let def = self.db.load_search_definition(search_definition_id)?;
        let health = self.health.load(search_definition_id)?;

        if health.circuit_open {
            return Ok(ScrapeRun { status: ScrapeStatus::Blocked, deal: None, ai_recommendation: None });
        }

        let (departure_date, return_date) = sample_dates(&def, Utc::now().date_naive());

        let params = FlightUrlParams {
            origin: &def.origin,
            destination: &def.destination,
            departure_date,
            return_date,
            adults: def.adults,
            children: def.children,
            infants_in_seat: def.infants_in_seat,
            infants_on_lap: def.infants_on_lap,
            cabin_class: def.cabin_class,
            stops_filter: def.stops_filter,
            currency: &def.currency,
        };
        let request = FetchRequest {
            search_definition_id,
            params,
            preferred_source: Some(def.preferred_source.as_str()),
        };

        let outcome = match fetcher::fetch(adapters, &request).await {
            Ok(success) => success.outcome,
            Err(failure) => {
                self.health.record_failure(
                    search_definition_id,
                    failure.reason,
                    Some(failure.message.clone()),
                    failure.screenshot_path.clone(),
                    failure.html_snapshot_path.clone(),
                )?;
                return Ok(ScrapeRun {
                    status: ScrapeStatus::FetchFailed { message: failure.message },
                    deal: None,
                    ai_recommendation: None,
                });
            }
        };

        let median = self.db.thirty_day_median(search_definition_id)?;
        let mut stored = 0usize;
        let mut dropped = 0usize;
        let mut stored_rows: Vec<FlightPrice> = Vec::new();

        for price in &outcome.prices {
            if price.confidence < STORE_MIN {
                dropped += 1;
                continue;
            }

            let mut row = FlightPrice::new(
                search_definition_id,
                departure_date,
                return_date,
                price.amount,
                def.total_passengers(),
                &def.currency,
                def.trip_type,
                price.source_tag,
                price.confidence,
            )?;
            row.airline = price.airline.clone();
            row.stops = price.stops.unwrap_or(0);
            row.duration_minutes = price.duration_minutes;
            row.is_suspicious = is_anomalous(price.amount, median);

            self.db.insert_flight_price(&row)?;
            stored += 1;
            stored_rows.push(row);
        }

        info!(
            search_definition_id,
            stored, dropped, "scraping service stored prices"
        );

        self.health.record_success(search_definition_id)?;

        let deal = self.select_deal(search_definition_id, &stored_rows)?;
        let ai_recommendation = self.enrich_deal(&def, deal.as_ref()).await;
        Ok(ScrapeRun {
            status: ScrapeStatus::Ok { stored, dropped_low_confidence: dropped },
            deal,
            ai_recommendation,
        })
    }

    /// §6's optional enrichment step: a one-line note about the deal from
    /// `AIService`, never a factor in whether it's a deal at all.
    async fn enrich_deal(
        &self,
        def: &SearchDefinition,
        deal: Option<&(FlightPrice, AnalysisResult)>,
    ) -> Option<String> {
        let ai = self.ai.as_ref()?;
        let (price, analysis) = deal?;
        let prompt = format!(
            "Route {} -> {}, price {:.0} {}, {}. Write a one-sentence traveler-facing note.",
            def.origin, def.destination, price.price_per_passenger, price.currency, analysis.reason
        );
        ai.complete(&prompt, "You summarize flight deals in one short sentence.", 100).await
    }

    /// Among freshly-stored rows that are not suspicious and meet
    /// `DEAL_MIN`, the cheapest is run through the Price Analyzer (§4.G.8).
    fn select_deal(
        &self,
        search_definition_id: i64,
        stored_rows: &[FlightPrice],
    ) -> Result<Option<(FlightPrice, AnalysisResult)>> {
        let cheapest = stored_rows
            .iter()
            .filter(|r| !r.is_suspicious && r.confidence >= DEAL_MIN)
            .min_by(|a, b| a.price_per_passenger.partial_cmp(&b.price_per_passenger).unwrap());

        let Some(cheapest) = cheapest else { return Ok(None) };

        let history = self.db.recent_prices(search_definition_id, 90)?;
        let result = analyzer::analyze(cheapest.price_per_passenger, &history);
        if result.is_deal {
            warn!(search_definition_id, price = cheapest.price_per_passenger, reason = %result.reason, "deal detected");
            Ok(Some((cheapest.clone(), result)))
        } else {
            Ok(None)
        }
    }
}

/// §4.G.6: years misread as prices, or implausible swings vs. the 30-day
/// median, mark a row suspicious without discarding it.
fn is_anomalous(price: f64, median: Option<f64>) -> bool {
    let now_year = Utc::now().date_naive().format("%Y").to_string().parse::<f64>().unwrap_or(0.0);
    if (price - (now_year - 1.0)).abs() < f64::EPSILON
        || (price - now_year).abs() < f64::EPSILON
        || (price - (now_year + 1.0)).abs() < f64::EPSILON
    {
        return true;
    }
    if let Some(median) = median {
        if price > median * (1.0 + ANOMALY_ABOVE_PCT / 100.0) {
            return true;
        }
        if price < median * ANOMALY_BELOW_FRACTION {
            return true;
        }
    }
    false
}

/// §4.G.3: deterministic rolling-horizon date sampling. Fixed-date searches
/// use their start date verbatim; rolling searches derive two independent
/// MD5-seeded offsets from `(search_id, today)`.
fn sample_dates(def: &SearchDefinition, today: NaiveDate) -> (NaiveDate, Option<NaiveDate>) {
    match &def.dates {
        SearchDates::Fixed { departure_date_start, departure_date_end } => {
            let departure = *departure_date_start;
            let return_date = match def.trip_type {
                crate::TripType::OneWay => None,
                crate::TripType::RoundTrip => Some(*departure_date_end),
            };
            (departure, return_date)
        }
        SearchDates::Rolling {
            departure_days_min,
            departure_days_max,
            trip_duration_days_min,
            trip_duration_days_max,
        } => {
            let today_iso = today.format("%Y-%m-%d").to_string();
            let days_out =
                seeded_offset(def.id, &today_iso, *departure_days_min, *departure_days_max);
            let trip_days =
                seeded_offset(def.id + 10_000, &today_iso, *trip_duration_days_min, *trip_duration_days_max);

            let departure = today + ChronoDuration::days(days_out);
            let return_date = match def.trip_type {
                crate::TripType::OneWay => None,
                crate::TripType::RoundTrip => Some(departure + ChronoDuration::days(trip_days)),
            };
            (departure, return_date)
        }
    }
}

fn seeded_offset(search_id: i64, today_iso: &str, min: i64, max: i64) -> i64 {
    let digest = md5::compute(format!("{search_id}{today_iso}"));
    let hex = format!("{digest:x}");
    let seed = u32::from_str_radix(&hex[..8], 16).unwrap_or(0) as i64;
    let span = (max - min + 1).max(1);
    min + seed % span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CabinClass, StopsFilter, TripType};

    fn rolling_def() -> SearchDefinition {
        SearchDefinition::new(
            42,
            "AKL",
            "NRT",
            TripType::RoundTrip,
            SearchDates::Rolling {
                departure_days_min: 30,
                departure_days_max: 90,
                trip_duration_days_min: 7,
                trip_duration_days_max: 14,
            },
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

    #[test]
    fn sampling_is_deterministic_for_the_same_search_and_day() {
        let def = rolling_def();
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let first = sample_dates(&def, today);
        let second = sample_dates(&def, today);
        assert_eq!(first, second);
    }

    #[test]
    fn sampled_departure_falls_within_the_configured_window() {
        let def = rolling_def();
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let (departure, return_date) = sample_dates(&def, today);
        let days_out = (departure - today).num_days();
        assert!((30..=90).contains(&days_out));
        let trip_days = (return_date.unwrap() - departure).num_days();
        assert!((7..=14).contains(&trip_days));
    }

    #[test]
    fn one_way_rolling_search_has_no_return_date() {
        let mut def = rolling_def();
        def.trip_type = TripType::OneWay;
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let (_, return_date) = sample_dates(&def, today);
        assert!(return_date.is_none());
    }

    #[test]
    fn anomaly_guard_flags_year_like_prices() {
        assert!(is_anomalous(2026.0, Some(900.0)));
        assert!(!is_anomalous(899.0, Some(900.0)));
    }

    #[test]
    fn anomaly_guard_flags_large_swings_from_median() {
        assert!(is_anomalous(4000.0, Some(900.0)));
        assert!(is_anomalous(100.0, Some(900.0)));
        assert!(!is_anomalous(850.0, Some(900.0)));
    }
}
