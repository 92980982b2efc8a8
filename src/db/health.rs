use super::Database;
use crate::models::{FailureReason, ScrapeHealth};
use crate::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

fn parse_failure_reason(s: &str) -> FailureReason {
    match s {
        "captcha" => FailureReason::Captcha,
        "timeout" => FailureReason::Timeout,
        "layout_change" => FailureReason::LayoutChange,
        "no_results" => FailureReason::NoResults,
        "blocked" => FailureReason::Blocked,
        "network_error" => FailureReason::NetworkError,
        _ => FailureReason::Unknown,
    }
}

fn parse_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|t| DateTime::parse_from_rfc3339(&t).ok()).map(|t| t.with_timezone(&Utc))
}

impl Database {
    /// Loads the health row for a search, or a fresh zeroed record if none
    /// exists yet (a search definition's health row is created lazily on its
    /// first recorded attempt).
    pub fn load_scrape_health(&self, search_definition_id: i64) -> Result<ScrapeHealth> {
        let row = self.session(|conn| {
            conn.query_row(
                "SELECT consecutive_failures, total_successes, total_failures,
                        last_success_at, last_failure_at, last_failure_reason, last_failure_message,
                        last_screenshot_path, last_html_snapshot_path, circuit_open, last_alert_sent_at
                 FROM scrape_health WHERE search_definition_id = ?1",
                params![search_definition_id],
                |row| {
                    Ok(ScrapeHealth {
                        id: 0,
                        search_definition_id,
                        consecutive_failures: row.get::<_, i64>(0)? as u32,
                        total_successes: row.get::<_, i64>(1)? as u32,
                        total_failures: row.get::<_, i64>(2)? as u32,
                        total_attempts: (row.get::<_, i64>(1)? + row.get::<_, i64>(2)?) as u32,
                        last_attempt_at: None,
                        last_success_at: parse_timestamp(row.get(3)?),
                        last_failure_at: parse_timestamp(row.get(4)?),
                        last_failure_reason: row.get::<_, Option<String>>(5)?.as_deref().map(parse_failure_reason),
                        last_failure_message: row.get(6)?,
                        last_screenshot_path: row.get(7)?,
                        last_html_snapshot_path: row.get(8)?,
                        circuit_open: row.get(9)?,
                        circuit_opened_at: None,
                        stale_alert_sent_at: parse_timestamp(row.get(10)?),
                    })
                },
            )
            .optional()
        })?;
        Ok(row.unwrap_or_else(|| ScrapeHealth::new(search_definition_id)))
    }

    pub fn save_scrape_health(&self, health: &ScrapeHealth) -> Result<()> {
        self.session(|conn| {
            conn.execute(
                "INSERT INTO scrape_health (
                    search_definition_id, consecutive_failures, total_successes, total_failures,
                    last_success_at, last_failure_at, last_failure_reason, last_failure_message,
                    last_screenshot_path, last_html_snapshot_path, circuit_open, last_alert_sent_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
                 ON CONFLICT(search_definition_id) DO UPDATE SET
                    consecutive_failures = excluded.consecutive_failures,
                    total_successes = excluded.total_successes,
                    total_failures = excluded.total_failures,
                    last_success_at = excluded.last_success_at,
                    last_failure_at = excluded.last_failure_at,
                    last_failure_reason = excluded.last_failure_reason,
                    last_failure_message = excluded.last_failure_message,
                    last_screenshot_path = excluded.last_screenshot_path,
                    last_html_snapshot_path = excluded.last_html_snapshot_path,
                    circuit_open = excluded.circuit_open,
                    last_alert_sent_at = excluded.last_alert_sent_at",
                params![
                    health.search_definition_id,
                    health.consecutive_failures,
                    health.total_successes,
                    health.total_failures,
                    health.last_success_at.map(|t| t.to_rfc3339()),
                    health.last_failure_at.map(|t| t.to_rfc3339()),
                    health.last_failure_reason.map(|r| r.as_str()),
                    health.last_failure_message,
                    health.last_screenshot_path,
                    health.last_html_snapshot_path,
                    health.circuit_open,
                    health.stale_alert_sent_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    /// All search definitions whose health row is unhealthy or circuit-open,
    /// for the hourly health check (§4.E).
    pub fn unhealthy_search_definition_ids(&self) -> Result<Vec<i64>> {
        self.session(|conn| {
            let mut stmt = conn.prepare(
                "SELECT search_definition_id FROM scrape_health
                 WHERE circuit_open = 1 OR consecutive_failures >= 3",
            )?;
            let ids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(ids)
        })
    }

    pub fn all_search_definition_ids_with_health(&self) -> Result<Vec<i64>> {
        self.session(|conn| {
            let mut stmt = conn.prepare("SELECT search_definition_id FROM scrape_health")?;
            let ids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_failing_health_row() {
        let db = Database::open_in_memory().unwrap();
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

        let mut health = db.load_scrape_health(1).unwrap();
        assert_eq!(health.total_attempts, 0);
        health.record_failure(FailureReason::Captcha, Some("blocked".into()), None, None);
        db.save_scrape_health(&health).unwrap();

        let reloaded = db.load_scrape_health(1).unwrap();
        assert_eq!(reloaded.consecutive_failures, 1);
        assert_eq!(reloaded.last_failure_reason, Some(FailureReason::Captcha));
    }
}
