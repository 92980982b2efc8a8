//! Health Tracker (§4.E): a thin persistence wrapper around the pure logic
//! already implemented on [`crate::models::ScrapeHealth`]. Grounded on
//! `original_source/backend/app/models/scrape_health.py` (the threshold
//! constants live on the model itself, not here).

use crate::db::Database;
use crate::models::{FailureReason, ScrapeHealth};
use crate::Result;
use chrono::{DateTime, Utc};

pub struct HealthTracker {
    db: Database,
}

impl HealthTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn load(&self, search_definition_id: i64) -> Result<ScrapeHealth> {
        self.db.load_scrape_health(search_definition_id)
    }

    pub fn record_success(&self, search_definition_id: i64) -> Result<ScrapeHealth> {
        let mut health = self.db.load_scrape_health(search_definition_id)?;
        health.record_success();
        self.db.save_scrape_health(&health)?;
        Ok(health)
    }

    pub fn record_failure(
        &self,
        search_definition_id: i64,
        reason: FailureReason,
        message: Option<String>,
        screenshot_path: Option<String>,
        html_snapshot_path: Option<String>,
    ) -> Result<ScrapeHealth> {
        let mut health = self.db.load_scrape_health(search_definition_id)?;
        health.record_failure(reason, message, screenshot_path, html_snapshot_path);
        self.db.save_scrape_health(&health)?;
        Ok(health)
    }

    /// Marks the staleness alert as sent, so it doesn't re-fire within the
    /// 24h suppression window.
    pub fn mark_stale_alert_sent(&self, search_definition_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut health = self.db.load_scrape_health(search_definition_id)?;
        health.stale_alert_sent_at = Some(now);
        self.db.save_scrape_health(&health)
    }

    /// Kind of alert to raise for a search, evaluated by the hourly health
    /// check (§4.J). `consecutive_failures >= 3` is a distinct, lower
    /// threshold from the circuit-open threshold of 5.
    pub fn alert_for(&self, search_definition_id: i64, now: DateTime<Utc>) -> Result<Option<HealthAlert>> {
        let health = self.db.load_scrape_health(search_definition_id)?;
        if health.stale_alert_due(now) {
            return Ok(Some(HealthAlert::Stale));
        }
        if health.circuit_open {
            return Ok(Some(HealthAlert::CircuitOpen));
        }
        if health.consecutive_failures >= 3 {
            return Ok(Some(HealthAlert::RepeatedFailures(health.consecutive_failures)));
        }
        Ok(None)
    }

    pub fn unhealthy_search_definition_ids(&self) -> Result<Vec<i64>> {
        self.db.unhealthy_search_definition_ids()
    }

    pub fn all_tracked_search_definition_ids(&self) -> Result<Vec<i64>> {
        self.db.all_search_definition_ids_with_health()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthAlert {
    Stale,
    CircuitOpen,
    RepeatedFailures(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_search_definition(db: &Database) {
        db.session(|conn| {
            conn.execute(
                "INSERT INTO search_definitions (origin, destination, trip_type, dates_json, adults,
                    children, infants_in_seat, infants_on_lap, cabin_class, stops_filter, currency,
                    created_at, updated_at)
                 VALUES ('AKL','NRT','round_trip','{}',1,0,0,0,'economy','any','NZD','2026-01-01T00:00:00Z','2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn alert_escalates_from_repeated_failures_to_circuit_open() {
        let db = Database::open_in_memory().unwrap();
        seed_search_definition(&db);
        let tracker = HealthTracker::new(db);
        let now = Utc::now();

        for _ in 0..3 {
            tracker.record_failure(1, FailureReason::Timeout, None, None, None).unwrap();
        }
        assert_eq!(tracker.alert_for(1, now).unwrap(), Some(HealthAlert::RepeatedFailures(3)));

        for _ in 0..2 {
            tracker.record_failure(1, FailureReason::Timeout, None, None, None).unwrap();
        }
        assert_eq!(tracker.alert_for(1, now).unwrap(), Some(HealthAlert::CircuitOpen));
    }

    #[test]
    fn success_clears_the_alert() {
        let db = Database::open_in_memory().unwrap();
        seed_search_definition(&db);
        let tracker = HealthTracker::new(db);
        tracker.record_failure(1, FailureReason::Blocked, None, None, None).unwrap();
        tracker.record_success(1).unwrap();
        assert_eq!(tracker.alert_for(1, Utc::now()).unwrap(), None);
    }
}
