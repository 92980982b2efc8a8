//! Trip-Plan Search (§4.H): expands a flexible [`crate::models::TripPlan`]
//! into a bounded matrix of concrete searches, runs them through the Price
//! Fetcher, and upserts scored matches. Grounded on
//! `original_source/backend/app/services/trip_plan_search.py`'s
//! expand-then-filter-then-upsert shape.

use crate::db::Database;
use crate::fetcher::{self, FetchRequest};
use crate::models::{MatchSource, TripPlan, TripPlanMatch};
use crate::sources::PriceSource;
use crate::url_builder::FlightUrlParams;
use crate::{CabinClass, Result, StopsFilter};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::time::Duration;

pub const MAX_SEARCHES_PER_PLAN: usize = 6;
pub const SEARCH_DELAY_SECONDS: u64 = 3;
const MAX_MATCHES_PER_PLAN: usize = 10;
const MAX_MATCHES_PER_DESTINATION: usize = 3;

/// A fixed type -> airport-set table for `destination_types` expansion
/// (§4.H.2), shared with the Trip-Plan Matcher's "matches a destination-type
/// tag" scoring (§4.I). Open Question: the original service's exact table
/// wasn't retrievable; codes below are a representative, documented
/// approximation (see DESIGN.md).
pub const DESTINATION_TYPE_TABLE: &[(&str, &[&str])] = &[
    ("beach", &["DPS", "NAN", "HNL", "PPT", "CNS"]),
    ("ski", &["CHC", "QUE", "HND", "GVA"]),
    ("city", &["NRT", "LHR", "JFK", "SIN", "HKG"]),
    ("nature", &["CHC", "ZQN", "YVR", "KEF"]),
];

pub fn expand_destination_types(destination_types: &[String]) -> Vec<String> {
    let mut codes = Vec::new();
    for dtype in destination_types {
        if let Some((_, airports)) = DESTINATION_TYPE_TABLE.iter().find(|(t, _)| *t == dtype) {
            codes.extend(airports.iter().map(|a| a.to_string()));
        }
    }
    codes
}

pub fn resolve_origins(trip: &TripPlan, home_airports: &[String]) -> Vec<String> {
    if !trip.origins.is_empty() {
        return trip.origins.clone();
    }
    if !home_airports.is_empty() {
        return home_airports.to_vec();
    }
    vec!["AKL".to_string()]
}

pub fn resolve_destinations(trip: &TripPlan) -> Vec<String> {
    let mut destinations = trip.destinations.clone();
    destinations.extend(expand_destination_types(&trip.destination_types));
    destinations.sort();
    destinations.dedup();
    destinations
}

/// §4.H.3: the effective search window, or one of three explanatory
/// early-return messages.
pub fn effective_window(trip: &TripPlan, today: NaiveDate) -> std::result::Result<(NaiveDate, NaiveDate), &'static str> {
    let horizon = today + ChronoDuration::days(300);
    let floor = today + ChronoDuration::days(14);

    let lower_bound = trip.available_from.map(|t| t.date_naive()).unwrap_or(today);
    let upper_bound = trip.available_to.map(|t| t.date_naive()).unwrap_or(horizon);

    let lower = lower_bound.max(floor);
    let upper = upper_bound.min(horizon);

    if lower_bound > horizon {
        return Err("too far out");
    }
    if upper < lower {
        return Err("no overlap");
    }
    if (upper - lower).num_days() < trip.trip_duration_min {
        return Err("window too short");
    }
    Ok((lower, upper))
}

/// Synthesizes 1-5 (departure, return) combinations spread evenly across
/// the window, using the midpoint of [trip_duration_min, trip_duration_max]
/// for the return offset.
pub fn synthesize_date_combos(trip: &TripPlan, window: (NaiveDate, NaiveDate)) -> Vec<(NaiveDate, NaiveDate)> {
    let (lower, upper) = window;
    let duration_mid = (trip.trip_duration_min + trip.trip_duration_max) / 2;
    let window_days = (upper - lower).num_days();
    let last_possible_departure = upper - ChronoDuration::days(duration_mid);

    if last_possible_departure < lower {
        return vec![(lower, lower + ChronoDuration::days(duration_mid))];
    }

    let span_days = (last_possible_departure - lower).num_days();
    let count = ((window_days / 30).clamp(1, 5)) as usize;

    (0..count)
        .map(|i| {
            let offset = if count == 1 { 0 } else { span_days * i as i64 / (count as i64 - 1) };
            let departure = lower + ChronoDuration::days(offset);
            (departure, departure + ChronoDuration::days(duration_mid))
        })
        .collect()
}

/// §4.H.4: primary origin x all destinations x date combos, capped.
pub fn build_search_matrix(
    origins: &[String],
    destinations: &[String],
    date_combos: &[(NaiveDate, NaiveDate)],
) -> Vec<(String, String, NaiveDate, NaiveDate)> {
    let Some(primary_origin) = origins.first() else { return Vec::new() };
    let mut matrix = Vec::new();
    'outer: for destination in destinations {
        for (departure, return_date) in date_combos {
            if matrix.len() >= MAX_SEARCHES_PER_PLAN {
                break 'outer;
            }
            matrix.push((primary_origin.clone(), destination.clone(), *departure, *return_date));
        }
    }
    matrix
}

/// §4.H.6: drops results priced under a plausibility floor for the given
/// route/stop/duration shape. `is_international` compares origin/destination
/// country, which callers resolve via the airport catalog.
pub fn is_plausibly_bogus(price: f64, is_international: bool, stops: i32, duration_minutes: Option<i32>) -> bool {
    if is_international && price < 200.0 {
        return true;
    }
    if stops == 0 && duration_minutes == Some(0) && price < 500.0 {
        return true;
    }
    false
}

/// §4.H.8: rescoring formula applied to the remaining matches after a
/// capped, per-destination top-N trim.
pub fn rescore(matches: &mut [TripPlanMatch], budget_max: Option<i64>) {
    for (rank, m) in matches.iter_mut().enumerate() {
        let mut score = 90.0 - 3.0 * rank as f64;
        if let Some(budget) = budget_max {
            let budget = budget as f64;
            if m.price < budget * 0.5 {
                score += 10.0;
            } else if m.price < budget * 0.75 {
                score += 5.0;
            }
        }
        m.match_score = score;
    }
}

/// §4.H.7-8: sorts by price, keeps the top N per destination, then evicts
/// down to the per-plan cap (cheapest matches win ties).
pub fn select_and_cap_matches(mut matches: Vec<TripPlanMatch>) -> Vec<TripPlanMatch> {
    matches.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());

    let mut per_destination: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut kept = Vec::new();
    for m in matches {
        let count = per_destination.entry(m.destination.clone()).or_insert(0);
        if *count < MAX_MATCHES_PER_DESTINATION {
            *count += 1;
            kept.push(m);
        }
    }

    kept.truncate(MAX_MATCHES_PER_PLAN);
    kept
}

pub struct TripSearchOutcome {
    pub matches: Vec<TripPlanMatch>,
    pub skipped_reason: Option<&'static str>,
}

pub async fn run(
    db: &Database,
    trip: &TripPlan,
    home_airports: &[String],
    adapters: &[Box<dyn PriceSource>],
) -> Result<TripSearchOutcome> {
    let today = Utc::now().date_naive();
    let window = match effective_window(trip, today) {
        Ok(w) => w,
        Err(reason) => return Ok(TripSearchOutcome { matches: vec![], skipped_reason: Some(reason) }),
    };

    let origins = resolve_origins(trip, home_airports);
    let destinations = resolve_destinations(trip);
    let combos = synthesize_date_combos(trip, window);
    let matrix = build_search_matrix(&origins, &destinations, &combos);

    let mut raw_matches = Vec::new();
    for (index, (origin, destination, departure, return_date)) in matrix.iter().enumerate() {
        let params = FlightUrlParams {
            origin,
            destination,
            departure_date: *departure,
            return_date: Some(*return_date),
            adults: trip.travelers_adults,
            children: trip.travelers_children,
            infants_in_seat: 0,
            infants_on_lap: 0,
            cabin_class: trip.cabin_classes.first().copied().unwrap_or(CabinClass::Economy),
            stops_filter: StopsFilter::Any,
            currency: &trip.budget_currency,
        };
        let request = FetchRequest { search_definition_id: trip.id, params, preferred_source: None };

        if let Ok(success) = fetcher::fetch(adapters, &request).await {
            for price in &success.outcome.prices {
                if let Some(budget) = trip.budget_max {
                    if price.amount > budget as f64 {
                        continue;
                    }
                }
                let is_international = origin[..2] != destination[..2];
                if is_plausibly_bogus(price.amount, is_international, price.stops.unwrap_or(0), price.duration_minutes) {
                    continue;
                }
                raw_matches.push(TripPlanMatch {
                    id: 0,
                    trip_plan_id: trip.id,
                    source: MatchSource::GoogleFlights,
                    deal_id: None,
                    origin: origin.clone(),
                    destination: destination.clone(),
                    departure_date: *departure,
                    return_date: Some(*return_date),
                    price: price.amount,
                    original_price: None,
                    original_currency: None,
                    airline: price.airline.clone(),
                    stops: price.stops.unwrap_or(0),
                    duration_minutes: price.duration_minutes,
                    booking_url: price.booking_url.clone(),
                    match_score: 0.0,
                    deal_title: None,
                    found_at: Utc::now(),
                });
            }
        }

        if index + 1 < matrix.len() {
            tokio::time::sleep(Duration::from_secs(SEARCH_DELAY_SECONDS)).await;
        }
    }

    let mut matches = select_and_cap_matches(raw_matches);
    rescore(&mut matches, trip.budget_max);

    db.upsert_trip_plan_matches(trip.id, &matches)?;
    Ok(TripSearchOutcome { matches, skipped_reason: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TripType;

    fn plan() -> TripPlan {
        let mut plan = TripPlan::new(1, "Japan trip");
        plan.trip_duration_min = 7;
        plan.trip_duration_max = 14;
        plan
    }

    #[test]
    fn window_too_short_when_duration_exceeds_bounded_range() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut trip = plan();
        trip.available_from = Some(Utc::now());
        trip.available_to = Some(chrono::DateTime::<Utc>::from_naive_utc_and_offset(
            (today + ChronoDuration::days(16)).and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ));
        trip.trip_duration_min = 20;
        let err = effective_window(&trip, today).unwrap_err();
        assert_eq!(err, "window too short");
    }

    #[test]
    fn too_far_out_when_available_from_beyond_horizon() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut trip = plan();
        trip.available_from = Some(chrono::DateTime::<Utc>::from_naive_utc_and_offset(
            (today + ChronoDuration::days(400)).and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ));
        let err = effective_window(&trip, today).unwrap_err();
        assert_eq!(err, "too far out");
    }

    #[test]
    fn default_window_spans_fourteen_to_three_hundred_days() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let trip = plan();
        let (lower, upper) = effective_window(&trip, today).unwrap();
        assert_eq!(lower, today + ChronoDuration::days(14));
        assert_eq!(upper, today + ChronoDuration::days(300));
    }

    #[test]
    fn date_combos_respect_duration_midpoint() {
        let trip = plan();
        let window = (NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        let combos = synthesize_date_combos(&trip, window);
        assert!(!combos.is_empty());
        for (dep, ret) in &combos {
            assert_eq!((*ret - *dep).num_days(), (trip.trip_duration_min + trip.trip_duration_max) / 2);
        }
    }

    #[test]
    fn search_matrix_is_capped_at_the_configured_maximum() {
        let origins = vec!["AKL".to_string()];
        let destinations: Vec<String> = (0..10).map(|i| format!("D{i}")).collect();
        let combos = vec![(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(), NaiveDate::from_ymd_opt(2026, 6, 10).unwrap())];
        let matrix = build_search_matrix(&origins, &destinations, &combos);
        assert_eq!(matrix.len(), MAX_SEARCHES_PER_PLAN);
    }

    #[test]
    fn plausibly_bogus_filters_cheap_international_and_instant_nonstop() {
        assert!(is_plausibly_bogus(150.0, true, 0, Some(600)));
        assert!(is_plausibly_bogus(400.0, false, 0, Some(0)));
        assert!(!is_plausibly_bogus(800.0, true, 0, Some(600)));
    }

    #[test]
    fn rescore_applies_rank_decay_and_budget_bonus() {
        let mut matches = vec![
            TripPlanMatch {
                id: 0, trip_plan_id: 1, source: MatchSource::GoogleFlights, deal_id: None,
                origin: "AKL".into(), destination: "NRT".into(),
                departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(), return_date: None,
                price: 400.0, original_price: None, original_currency: None, airline: None,
                stops: 0, duration_minutes: None, booking_url: None, match_score: 0.0,
                deal_title: None, found_at: Utc::now(),
            },
        ];
        rescore(&mut matches, Some(1000));
        assert_eq!(matches[0].match_score, 100.0);
    }
}
