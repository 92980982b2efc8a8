use chrono::{DateTime, NaiveDate, Utc};

/// Source that produced a `TripPlanMatch` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    GoogleFlights,
    RssDeal,
    SeatsAero,
    Amadeus,
}

/// A concrete flight result attached to a `TripPlan`, unifying results from
/// every source behind one consolidated view (§3, §4.H.8).
#[derive(Debug, Clone)]
pub struct TripPlanMatch {
    pub id: i64,
    pub trip_plan_id: i64,
    pub source: MatchSource,
    pub deal_id: Option<i64>,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    /// Price expressed in the plan's budget currency.
    pub price: f64,
    pub original_price: Option<f64>,
    pub original_currency: Option<String>,
    pub airline: Option<String>,
    pub stops: i32,
    pub duration_minutes: Option<i32>,
    pub booking_url: Option<String>,
    pub match_score: f64,
    pub deal_title: Option<String>,
    pub found_at: DateTime<Utc>,
}

impl TripPlanMatch {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.departure_date < today
    }

    pub fn days_until_departure(&self, today: NaiveDate) -> i64 {
        (self.departure_date - today).num_days()
    }

    /// Natural dedup/upsert key for §4.H.8's "upsert by (trip, origin, dest,
    /// dates)" rule.
    pub fn upsert_key(&self) -> (i64, &str, &str, NaiveDate, Option<NaiveDate>) {
        (
            self.trip_plan_id,
            self.origin.as_str(),
            self.destination.as_str(),
            self.departure_date,
            self.return_date,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TripPlanMatch {
        TripPlanMatch {
            id: 1,
            trip_plan_id: 1,
            source: MatchSource::GoogleFlights,
            deal_id: None,
            origin: "AKL".to_string(),
            destination: "NRT".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()),
            price: 1200.0,
            original_price: None,
            original_currency: None,
            airline: Some("NZ".to_string()),
            stops: 0,
            duration_minutes: Some(660),
            booking_url: None,
            match_score: 85.0,
            deal_title: None,
            found_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_is_date_only() {
        let m = sample();
        assert!(m.is_expired(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()));
        assert!(!m.is_expired(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }
}
