use crate::CabinClass;
use chrono::{DateTime, Duration, Utc};

/// Flexible trip search spec (§3, §4.H). Unlike `SearchDefinition`, a
/// `TripPlan` doesn't pin an exact origin/destination/date — it expands into
/// many concrete searches at scan time.
#[derive(Debug, Clone)]
pub struct TripPlan {
    pub id: i64,
    pub name: String,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub destination_types: Vec<String>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_to: Option<DateTime<Utc>>,
    pub trip_duration_min: i64,
    pub trip_duration_max: i64,
    pub budget_max: Option<i64>,
    pub budget_currency: String,
    pub travelers_adults: i32,
    pub travelers_children: i32,
    pub cabin_classes: Vec<CabinClass>,
    pub is_active: bool,
    pub notify_on_match: bool,
    pub check_frequency_hours: i64,
    pub notes: Option<String>,
    pub match_count: i32,
    pub last_match_at: Option<DateTime<Utc>>,

    /// Soft advisory lock (§5): treated as unlocked once `search_started_at`
    /// is more than 10 minutes old, regardless of this flag.
    pub search_in_progress: bool,
    pub search_started_at: Option<DateTime<Utc>>,
}

impl TripPlan {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            origins: Vec::new(),
            destinations: Vec::new(),
            destination_types: Vec::new(),
            available_from: None,
            available_to: None,
            trip_duration_min: 3,
            trip_duration_max: 14,
            budget_max: None,
            budget_currency: "NZD".to_string(),
            travelers_adults: 2,
            travelers_children: 0,
            cabin_classes: Vec::new(),
            is_active: true,
            notify_on_match: true,
            check_frequency_hours: 12,
            notes: None,
            match_count: 0,
            last_match_at: None,
            search_in_progress: false,
            search_started_at: None,
        }
    }

    /// Whether a new §4.H search run is allowed right now: either no lock is
    /// held, or the held lock has gone stale (10-minute timeout).
    pub fn can_start_search(&self, now: DateTime<Utc>) -> bool {
        if !self.search_in_progress {
            return true;
        }
        match self.search_started_at {
            Some(started) => now - started > Duration::minutes(10),
            None => true,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>, updated_at: DateTime<Utc>) -> bool {
        self.is_active && now - updated_at >= Duration::hours(self.check_frequency_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_plan_can_start_search() {
        let plan = TripPlan::new(1, "Japan trip");
        assert!(plan.can_start_search(Utc::now()));
    }

    #[test]
    fn locked_plan_blocks_until_stale() {
        let mut plan = TripPlan::new(1, "Japan trip");
        plan.search_in_progress = true;
        plan.search_started_at = Some(Utc::now());
        assert!(!plan.can_start_search(Utc::now()));

        plan.search_started_at = Some(Utc::now() - Duration::minutes(11));
        assert!(plan.can_start_search(Utc::now()));
    }
}
