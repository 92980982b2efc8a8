//! Trip-Plan Matcher (§4.I): scores an RSS-sourced [`crate::models::Deal`]
//! against a [`crate::models::TripPlan`] on a 0-100 scale. Grounded on
//! `original_source/backend/app/services/trip_matcher.py`'s scored
//! component breakdown; currency normalization reuses [`crate::currency`].

use crate::airports::AirportCatalog;
use crate::currency::CurrencyService;
use crate::models::{Deal, TripPlan};
use crate::trip_search::DESTINATION_TYPE_TABLE;
use crate::CabinClass;
use std::str::FromStr;

const BUDGET_OVER_HARD_REJECT_PCT: f64 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct MatchScore {
    pub total: f64,
    pub origin_matched: bool,
    pub destination_matched: bool,
}

fn same_region(catalog: &AirportCatalog, a: &str, b: &str) -> bool {
    match (catalog.lookup(a), catalog.lookup(b)) {
        (Some(x), Some(y)) => x.region.eq_ignore_ascii_case(&y.region),
        _ => false,
    }
}

fn destination_type_matches(destination: &str, destination_types: &[String]) -> bool {
    destination_types.iter().any(|dtype| {
        DESTINATION_TYPE_TABLE
            .iter()
            .find(|(t, _)| t == dtype)
            .map(|(_, codes)| codes.contains(&destination))
            .unwrap_or(false)
    })
}

fn score_origin(deal_origin: &str, trip: &TripPlan, catalog: &AirportCatalog) -> (f64, bool) {
    if trip.origins.is_empty() {
        return (10.0, true);
    }
    if trip.origins.iter().any(|o| o.eq_ignore_ascii_case(deal_origin)) {
        return (30.0, true);
    }
    if trip.origins.iter().any(|o| same_region(catalog, o, deal_origin)) {
        return (15.0, true);
    }
    (0.0, false)
}

fn score_destination(
    deal_destination: &str,
    trip: &TripPlan,
    destination_types: &[String],
    catalog: &AirportCatalog,
) -> (f64, bool) {
    if trip.destinations.is_empty() && destination_types.is_empty() {
        return (10.0, true);
    }
    if trip.destinations.iter().any(|d| d.eq_ignore_ascii_case(deal_destination)) {
        return (30.0, true);
    }
    if trip.destinations.iter().any(|d| same_region(catalog, d, deal_destination)) {
        return (20.0, true);
    }
    if destination_type_matches(deal_destination, destination_types) {
        return (25.0, true);
    }
    (0.0, false)
}

/// Returns `None` (hard reject) when `price` exceeds `budget` by more than
/// `BUDGET_OVER_HARD_REJECT_PCT`, otherwise a signed score contribution.
fn score_budget(price: f64, budget: Option<f64>) -> Option<f64> {
    let Some(budget) = budget else { return Some(0.0) };
    if budget <= 0.0 {
        return Some(0.0);
    }
    let ratio = price / budget;
    if ratio <= 1.0 {
        let savings_pct = (1.0 - ratio) * 100.0;
        Some(20.0 + (savings_pct / 100.0 * 20.0).min(20.0))
    } else {
        let over_pct = (ratio - 1.0) * 100.0;
        if over_pct > BUDGET_OVER_HARD_REJECT_PCT {
            None
        } else {
            Some(-(over_pct / BUDGET_OVER_HARD_REJECT_PCT * 30.0))
        }
    }
}

fn score_cabin(deal_cabin: Option<CabinClass>, trip_cabin_classes: &[CabinClass]) -> f64 {
    match deal_cabin {
        Some(cabin) if trip_cabin_classes.contains(&cabin) => 10.0,
        _ => 0.0,
    }
}

/// Scores `deal` against `trip`. `price_in_budget_currency` must already be
/// converted via [`CurrencyService`] before calling. Returns `None` only
/// when both origin and destination context are entirely absent from the
/// plan (there's nothing to score against).
pub fn score(
    deal: &Deal,
    trip: &TripPlan,
    price_in_budget_currency: Option<f64>,
    catalog: &AirportCatalog,
) -> MatchScore {
    let Some(deal_origin) = deal.parsed_origin.as_deref() else {
        return MatchScore::default();
    };
    let Some(deal_destination) = deal.parsed_destination.as_deref() else {
        return MatchScore::default();
    };

    let (origin_score, origin_matched) = score_origin(deal_origin, trip, catalog);
    let (destination_score, destination_matched) =
        score_destination(deal_destination, trip, &trip.destination_types, catalog);

    if !origin_matched || !destination_matched {
        return MatchScore { total: 0.0, origin_matched, destination_matched };
    }

    let budget_score = match price_in_budget_currency.and_then(|p| score_budget(p, trip.budget_max.map(|b| b as f64))) {
        Some(s) => s,
        None => return MatchScore { total: 0.0, origin_matched, destination_matched },
    };

    let deal_cabin = deal.parsed_cabin_class.as_deref().and_then(|c| c.parse::<CabinClass>().ok());
    let cabin_score = score_cabin(deal_cabin, &trip.cabin_classes);

    let total = (origin_score + destination_score + budget_score + cabin_score).max(0.0);
    MatchScore { total, origin_matched, destination_matched }
}

/// Converts a deal's price into the plan's budget currency before scoring,
/// per §4.I's "currency conversion happens before comparison" rule.
pub async fn score_with_conversion(
    deal: &Deal,
    trip: &TripPlan,
    currency: &CurrencyService,
    catalog: &AirportCatalog,
) -> MatchScore {
    let price_in_budget_currency = match (deal.parsed_price, deal.parsed_currency.as_deref()) {
        (Some(price), Some(from)) => currency.convert(price as f64, from, &trip.budget_currency).await,
        _ => None,
    };
    score(deal, trip, price_in_budget_currency, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParseStatus;
    use crate::models::TripPlan;

    fn deal(origin: &str, destination: &str, price: i64) -> Deal {
        Deal {
            id: 1,
            source: "test".into(),
            link: "https://example.com".into(),
            published_at: None,
            raw_title: "deal".into(),
            raw_summary: None,
            parsed_origin: Some(origin.into()),
            parsed_destination: Some(destination.into()),
            parsed_price: Some(price),
            parsed_currency: Some("NZD".into()),
            parsed_airline: None,
            parsed_cabin_class: Some("economy".into()),
            parse_status: ParseStatus::Success,
            is_relevant: true,
            score: 0.0,
        }
    }

    fn catalog() -> AirportCatalog {
        AirportCatalog::fallback()
    }

    #[test]
    fn exact_origin_and_destination_match_scores_well_within_budget() {
        let mut trip = TripPlan::new(1, "Japan");
        trip.origins = vec!["AKL".into()];
        trip.destinations = vec!["NRT".into()];
        trip.budget_max = Some(2000);
        trip.cabin_classes = vec![CabinClass::Economy];

        let d = deal("AKL", "NRT", 900);
        let result = score(&d, &trip, Some(900.0), &catalog());
        assert!(result.origin_matched && result.destination_matched);
        assert!(result.total > 60.0);
    }

    #[test]
    fn far_over_budget_hard_rejects() {
        let mut trip = TripPlan::new(1, "Japan");
        trip.origins = vec!["AKL".into()];
        trip.destinations = vec!["NRT".into()];
        trip.budget_max = Some(1000);

        let d = deal("AKL", "NRT", 2000);
        let result = score(&d, &trip, Some(2000.0), &catalog());
        assert_eq!(result.total, 0.0);
    }

    #[test]
    fn unmatched_origin_scores_zero() {
        let mut trip = TripPlan::new(1, "Japan");
        trip.origins = vec!["SYD".into()];
        trip.destinations = vec!["NRT".into()];

        let d = deal("AKL", "NRT", 900);
        let result = score(&d, &trip, Some(900.0), &catalog());
        assert!(!result.origin_matched);
        assert_eq!(result.total, 0.0);
    }

    #[test]
    fn no_origin_filter_on_plan_grants_baseline_score() {
        let mut trip = TripPlan::new(1, "Anywhere");
        trip.destinations = vec!["NRT".into()];
        let d = deal("AKL", "NRT", 900);
        let result = score(&d, &trip, Some(900.0), &catalog());
        assert!(result.origin_matched);
    }
}
