use crate::{Result, TripType, WalkaboutError};
use chrono::{DateTime, NaiveDate, Utc};

/// A single observed price (§3). Comparable only against other rows sharing
/// `search_definition_id`.
#[derive(Debug, Clone)]
pub struct FlightPrice {
    pub id: i64,
    pub search_definition_id: i64,
    pub scraped_at: DateTime<Utc>,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub price_per_passenger: f64,
    pub total_price: f64,
    pub passenger_count: i32,
    pub currency: String,
    pub trip_type: TripType,
    pub airline: Option<String>,
    pub stops: i32,
    pub duration_minutes: Option<i32>,
    pub layover_airports: Option<String>,
    pub source_tag: String,
    pub raw_data: Option<String>,
    pub confidence: f64,
    pub is_suspicious: bool,
}

impl FlightPrice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search_definition_id: i64,
        departure_date: NaiveDate,
        return_date: Option<NaiveDate>,
        price_per_passenger: f64,
        passenger_count: i32,
        currency: &str,
        trip_type: TripType,
        source_tag: &str,
        confidence: f64,
    ) -> Result<Self> {
        if price_per_passenger <= 0.0 {
            return Err(WalkaboutError::InvalidSearchDefinition(
                "price must be > 0".into(),
            ));
        }
        if let Some(ret) = return_date {
            if departure_date > ret {
                return Err(WalkaboutError::InvalidSearchDefinition(
                    "departure_date must be <= return_date".into(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(WalkaboutError::InvalidSearchDefinition(
                "confidence must be in [0, 1]".into(),
            ));
        }

        Ok(Self {
            id: 0,
            search_definition_id,
            scraped_at: Utc::now(),
            departure_date,
            return_date,
            price_per_passenger,
            total_price: price_per_passenger * passenger_count as f64,
            passenger_count,
            currency: currency.to_uppercase(),
            trip_type,
            airline: None,
            stops: 0,
            duration_minutes: None,
            layover_airports: None,
            source_tag: source_tag.to_string(),
            raw_data: None,
            confidence,
            is_suspicious: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_price() {
        let err = FlightPrice::new(
            1,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            None,
            0.0,
            1,
            "NZD",
            TripType::OneWay,
            "serpapi",
            0.9,
        )
        .unwrap_err();
        assert!(matches!(err, WalkaboutError::InvalidSearchDefinition(_)));
    }

    #[test]
    fn rejects_return_before_departure() {
        let dep = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let ret = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let err = FlightPrice::new(
            1, dep, Some(ret), 500.0, 1, "NZD", TripType::RoundTrip, "serpapi", 0.9,
        )
        .unwrap_err();
        assert!(matches!(err, WalkaboutError::InvalidSearchDefinition(_)));
    }

    #[test]
    fn total_price_scales_by_passenger_count() {
        let p = FlightPrice::new(
            1,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            None,
            500.0,
            3,
            "NZD",
            TripType::OneWay,
            "serpapi",
            0.9,
        )
        .unwrap();
        assert_eq!(p.total_price, 1500.0);
    }
}
