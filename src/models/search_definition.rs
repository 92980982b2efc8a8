use crate::{CabinClass, Result, StopsFilter, TripType, WalkaboutError};
use chrono::NaiveDate;

/// Fully specifies what a price series means: any field change that can
/// affect price semantics must create a new version rather than mutate in
/// place (invariant P1 — comparability).
#[derive(Debug, Clone)]
pub struct SearchDefinition {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub trip_type: TripType,
    pub dates: SearchDates,
    pub adults: i32,
    pub children: i32,
    pub infants_in_seat: i32,
    pub infants_on_lap: i32,
    pub cabin_class: CabinClass,
    pub stops_filter: StopsFilter,
    pub include_airlines: Vec<String>,
    pub exclude_airlines: Vec<String>,
    pub currency: String,
    pub locale: String,
    pub carry_on_bags: i32,
    pub checked_bags: i32,
    pub name: Option<String>,
    pub is_active: bool,
    pub scrape_frequency_hours: i32,
    pub preferred_source: String,
    pub version: i32,
    pub parent_id: Option<i64>,
}

/// Either a fixed departure window, or a rolling "days from now" window with
/// trip-duration bounds used by the scraping service's rolling-horizon date
/// sampler (§4.G.3).
#[derive(Debug, Clone)]
pub enum SearchDates {
    Fixed {
        departure_date_start: NaiveDate,
        departure_date_end: NaiveDate,
    },
    Rolling {
        departure_days_min: i64,
        departure_days_max: i64,
        trip_duration_days_min: i64,
        trip_duration_days_max: i64,
    },
}

impl SearchDefinition {
    /// Validates the fields an external caller can set; rejects invalid IATA
    /// codes and impossible duration ranges synchronously (error kind 6 in
    /// the error handling design), before a value of this type can exist.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        origin: &str,
        destination: &str,
        trip_type: TripType,
        dates: SearchDates,
        adults: i32,
        children: i32,
        infants_in_seat: i32,
        infants_on_lap: i32,
        cabin_class: CabinClass,
        stops_filter: StopsFilter,
        currency: &str,
    ) -> Result<Self> {
        let origin = validate_iata(origin)?;
        let destination = validate_iata(destination)?;
        if let SearchDates::Rolling {
            departure_days_min,
            departure_days_max,
            trip_duration_days_min,
            trip_duration_days_max,
            ..
        } = &dates
        {
            if departure_days_min > departure_days_max {
                return Err(WalkaboutError::InvalidSearchDefinition(
                    "departure_days_min must be <= departure_days_max".into(),
                ));
            }
            if trip_duration_days_min > trip_duration_days_max {
                return Err(WalkaboutError::InvalidSearchDefinition(
                    "trip_duration_days_min must be <= trip_duration_days_max".into(),
                ));
            }
        }
        if currency.len() != 3 {
            return Err(WalkaboutError::InvalidSearchDefinition(format!(
                "currency must be an ISO 4217 code, got {currency}"
            )));
        }

        Ok(Self {
            id,
            origin,
            destination,
            trip_type,
            dates,
            adults,
            children,
            infants_in_seat,
            infants_on_lap,
            cabin_class,
            stops_filter,
            include_airlines: Vec::new(),
            exclude_airlines: Vec::new(),
            currency: currency.to_uppercase(),
            locale: "en-US".to_string(),
            carry_on_bags: 0,
            checked_bags: 0,
            name: None,
            is_active: true,
            scrape_frequency_hours: 12,
            preferred_source: "auto".to_string(),
            version: 1,
            parent_id: None,
        })
    }

    pub fn total_passengers(&self) -> i32 {
        self.adults + self.children + self.infants_in_seat + self.infants_on_lap
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        format!(
            "{}-{} ({}pax, {})",
            self.origin,
            self.destination,
            self.total_passengers(),
            self.cabin_class
        )
    }

    /// Whether `other` represents the same price semantics as `self` — used
    /// to decide whether an edit can mutate in place or must fork a new
    /// version (invariant in §3).
    pub fn is_price_equivalent_to(&self, other: &SearchDefinition) -> bool {
        self.origin == other.origin
            && self.destination == other.destination
            && self.trip_type == other.trip_type
            && self.adults == other.adults
            && self.children == other.children
            && self.infants_in_seat == other.infants_in_seat
            && self.infants_on_lap == other.infants_on_lap
            && self.cabin_class == other.cabin_class
            && self.stops_filter == other.stops_filter
            && self.currency == other.currency
    }
}

fn validate_iata(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(WalkaboutError::InvalidIata(code));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rolling_dates() -> SearchDates {
        SearchDates::Rolling {
            departure_days_min: 30,
            departure_days_max: 90,
            trip_duration_days_min: 7,
            trip_duration_days_max: 14,
        }
    }

    #[test]
    fn rejects_invalid_iata() {
        let err = SearchDefinition::new(
            1, "auckland", "SYD", TripType::RoundTrip, rolling_dates(),
            2, 0, 0, 0, CabinClass::Economy, StopsFilter::Any, "NZD",
        ).unwrap_err();
        assert!(matches!(err, WalkaboutError::InvalidIata(_)));
    }

    #[test]
    fn rejects_inverted_duration_range() {
        let bad_dates = SearchDates::Rolling {
            departure_days_min: 90,
            departure_days_max: 30,
            trip_duration_days_min: 7,
            trip_duration_days_max: 14,
        };
        let err = SearchDefinition::new(
            1, "AKL", "SYD", TripType::RoundTrip, bad_dates,
            2, 0, 0, 0, CabinClass::Economy, StopsFilter::Any, "NZD",
        ).unwrap_err();
        assert!(matches!(err, WalkaboutError::InvalidSearchDefinition(_)));
    }

    #[test]
    fn display_name_falls_back_to_route() {
        let def = SearchDefinition::new(
            1, "AKL", "SYD", TripType::RoundTrip, rolling_dates(),
            2, 1, 0, 0, CabinClass::Economy, StopsFilter::Any, "NZD",
        ).unwrap();
        assert_eq!(def.display_name(), "AKL-SYD (3pax, economy)");
    }

    #[test]
    fn price_equivalence_ignores_non_semantic_fields() {
        let a = SearchDefinition::new(
            1, "AKL", "SYD", TripType::RoundTrip, rolling_dates(),
            2, 0, 0, 0, CabinClass::Economy, StopsFilter::Any, "NZD",
        ).unwrap();
        let mut b = a.clone();
        b.name = Some("My trip".to_string());
        assert!(a.is_price_equivalent_to(&b));
        b.cabin_class = CabinClass::Business;
        assert!(!a.is_price_equivalent_to(&b));
    }
}
