use super::Database;
use crate::models::{MatchSource, TripPlan, TripPlanMatch};
use crate::{CabinClass, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;

fn json_vec(v: &[String]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

fn parse_json_vec(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_cabin_classes(s: &str) -> Vec<CabinClass> {
    parse_json_vec(s).iter().filter_map(|c| CabinClass::from_str(c).ok()).collect()
}

fn parse_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|t| DateTime::parse_from_rfc3339(&t).ok()).map(|t| t.with_timezone(&Utc))
}

fn row_to_trip_plan(row: &Row) -> rusqlite::Result<TripPlan> {
    Ok(TripPlan {
        id: row.get(0)?,
        name: row.get(1)?,
        origins: parse_json_vec(&row.get::<_, String>(2)?),
        destinations: parse_json_vec(&row.get::<_, String>(3)?),
        destination_types: Vec::new(),
        available_from: parse_timestamp(row.get(4)?),
        available_to: parse_timestamp(row.get(5)?),
        trip_duration_min: row.get::<_, Option<i64>>(6)?.unwrap_or(3),
        trip_duration_max: row.get::<_, Option<i64>>(7)?.unwrap_or(14),
        budget_max: row.get(8)?,
        budget_currency: row.get::<_, Option<String>>(9)?.unwrap_or_else(|| "NZD".to_string()),
        travelers_adults: 2,
        travelers_children: 0,
        cabin_classes: parse_cabin_classes(&row.get::<_, String>(10)?),
        is_active: row.get(11)?,
        notify_on_match: true,
        check_frequency_hours: 12,
        notes: None,
        match_count: 0,
        last_match_at: None,
        search_in_progress: row.get(12)?,
        search_started_at: parse_timestamp(row.get(13)?),
    })
}

impl Database {
    pub fn load_trip_plan(&self, id: i64) -> Result<TripPlan> {
        self.session(|conn| {
            conn.query_row(
                "SELECT id, name, origins_json, destinations_json, earliest_departure, latest_departure,
                        trip_duration_days_min, trip_duration_days_max, budget_amount, budget_currency,
                        cabin_classes_json, is_active, search_in_progress, search_started_at
                 FROM trip_plans WHERE id = ?1",
                params![id],
                row_to_trip_plan,
            )
        })
    }

    pub fn active_trip_plan_ids(&self) -> Result<Vec<i64>> {
        self.session(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM trip_plans WHERE is_active = 1")?;
            stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()
        })
    }

    pub fn trip_plan_updated_at(&self, id: i64) -> Result<DateTime<Utc>> {
        self.session(|conn| {
            conn.query_row("SELECT updated_at FROM trip_plans WHERE id = ?1", params![id], |row| {
                row.get::<_, String>(0)
            })
        })
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()))
    }

    /// §5's soft advisory lock: acquires iff no lock is held or the held
    /// lock is stale. Returns whether the lock was acquired.
    pub fn try_acquire_trip_search_lock(&self, id: i64) -> Result<bool> {
        let plan = self.load_trip_plan(id)?;
        if !plan.can_start_search(Utc::now()) {
            return Ok(false);
        }
        self.session(|conn| {
            conn.execute(
                "UPDATE trip_plans SET search_in_progress = 1, search_started_at = ?2 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;
        Ok(true)
    }

    pub fn release_trip_search_lock(&self, id: i64) -> Result<()> {
        self.session(|conn| {
            conn.execute(
                "UPDATE trip_plans SET search_in_progress = 0, search_started_at = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }

    /// §4.H.8: upsert by (trip, origin, destination, departure, return),
    /// keeping the lower of the stored and incoming price, then updating
    /// the plan's `match_count`/`last_match_at` bookkeeping.
    pub fn upsert_trip_plan_matches(&self, trip_id: i64, matches: &[TripPlanMatch]) -> Result<()> {
        self.transaction(|tx| {
            for m in matches {
                tx.execute(
                    "INSERT INTO trip_plan_matches (
                        trip_plan_id, source, deal_id, origin, destination, departure_date, return_date,
                        price, original_price, original_currency, airline, stops, duration_minutes,
                        booking_url, match_score, deal_title, found_at
                     ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
                     ON CONFLICT(trip_plan_id, origin, destination, departure_date, return_date) DO UPDATE SET
                        price = MIN(price, excluded.price),
                        match_score = excluded.match_score,
                        found_at = excluded.found_at",
                    params![
                        trip_id,
                        match_source_str(m.source),
                        m.deal_id,
                        m.origin,
                        m.destination,
                        m.departure_date,
                        m.return_date,
                        m.price,
                        m.original_price,
                        m.original_currency,
                        m.airline,
                        m.stops,
                        m.duration_minutes,
                        m.booking_url,
                        m.match_score,
                        m.deal_title,
                        m.found_at.to_rfc3339(),
                    ],
                )?;
            }

            let match_count: i64 =
                tx.query_row("SELECT count(*) FROM trip_plan_matches WHERE trip_plan_id = ?1", params![trip_id], |r| r.get(0))?;
            tx.execute(
                "UPDATE trip_plans SET match_count = ?2, last_match_at = ?3, search_in_progress = 0,
                    search_started_at = NULL, updated_at = ?3 WHERE id = ?1",
                params![trip_id, match_count, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }
}

fn match_source_str(source: MatchSource) -> &'static str {
    match source {
        MatchSource::GoogleFlights => "google_flights",
        MatchSource::RssDeal => "rss_deal",
        MatchSource::SeatsAero => "seats_aero",
        MatchSource::Amadeus => "amadeus",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seed_plan(db: &Database) {
        db.session(|conn| {
            conn.execute(
                "INSERT INTO trip_plans (name, origins_json, destinations_json, cabin_classes_json,
                    created_at, updated_at)
                 VALUES ('Japan', '[]', '[]', '[]', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn sample_match(price: f64) -> TripPlanMatch {
        TripPlanMatch {
            id: 0,
            trip_plan_id: 1,
            source: MatchSource::GoogleFlights,
            deal_id: None,
            origin: "AKL".into(),
            destination: "NRT".into(),
            departure_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()),
            price,
            original_price: None,
            original_currency: None,
            airline: None,
            stops: 0,
            duration_minutes: None,
            booking_url: None,
            match_score: 90.0,
            deal_title: None,
            found_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_keeps_the_lower_price_on_conflict() {
        let db = Database::open_in_memory().unwrap();
        seed_plan(&db);
        db.upsert_trip_plan_matches(1, &[sample_match(1200.0)]).unwrap();
        db.upsert_trip_plan_matches(1, &[sample_match(900.0)]).unwrap();
        db.upsert_trip_plan_matches(1, &[sample_match(1500.0)]).unwrap();

        let price: f64 = db
            .session(|conn| {
                conn.query_row(
                    "SELECT price FROM trip_plan_matches WHERE trip_plan_id = 1 AND origin = 'AKL'",
                    [],
                    |r| r.get(0),
                )
            })
            .unwrap();
        assert_eq!(price, 900.0);
    }

    #[test]
    fn lock_is_acquired_and_released() {
        let db = Database::open_in_memory().unwrap();
        seed_plan(&db);
        assert!(db.try_acquire_trip_search_lock(1).unwrap());
        assert!(!db.try_acquire_trip_search_lock(1).unwrap());
        db.release_trip_search_lock(1).unwrap();
        assert!(db.try_acquire_trip_search_lock(1).unwrap());
    }
}
