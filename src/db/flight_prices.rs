use super::Database;
use crate::models::FlightPrice;
use crate::{Result, TripType};
use chrono::Utc;
use rusqlite::{params, Row};
use std::str::FromStr;

fn row_to_flight_price(row: &Row) -> rusqlite::Result<FlightPrice> {
    let trip_type_raw: String = row.get(7)?;
    let trip_type = TripType::from_str(&trip_type_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?;
    let scraped_at_raw: String = row.get(17)?;
    let scraped_at = chrono::DateTime::parse_from_rfc3339(&scraped_at_raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(17, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(FlightPrice {
        id: row.get(0)?,
        search_definition_id: row.get(1)?,
        departure_date: row.get(2)?,
        return_date: row.get(3)?,
        price_per_passenger: row.get(4)?,
        passenger_count: row.get(5)?,
        total_price: row.get(6)?,
        trip_type,
        currency: row.get(8)?,
        source_tag: row.get(9)?,
        confidence: row.get(10)?,
        is_suspicious: row.get(11)?,
        airline: row.get(12)?,
        stops: row.get(13)?,
        duration_minutes: row.get(14)?,
        layover_airports: row.get::<_, Option<String>>(15)?,
        raw_data: None,
        scraped_at,
    })
}

impl Database {
    pub fn insert_flight_price(&self, price: &FlightPrice) -> Result<i64> {
        self.session(|conn| {
            conn.execute(
                "INSERT INTO flight_prices (
                    search_definition_id, departure_date, return_date, price_per_passenger,
                    passenger_count, total_price, currency, trip_type, source_tag, confidence,
                    is_suspicious, airline, stops, duration_minutes, layover_airports_json, scraped_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                params![
                    price.search_definition_id,
                    price.departure_date,
                    price.return_date,
                    price.price_per_passenger,
                    price.passenger_count,
                    price.total_price,
                    price.currency,
                    price.trip_type.to_string(),
                    price.source_tag,
                    price.confidence,
                    price.is_suspicious,
                    price.airline,
                    price.stops,
                    price.duration_minutes,
                    price.layover_airports,
                    price.scraped_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Non-suspicious prices scraped within the last `days` days, used for
    /// both the pre-store anomaly guard and the Price Analyzer's history
    /// window (§4.F, §4.G.6).
    pub fn recent_prices(&self, search_definition_id: i64, days: i64) -> Result<Vec<f64>> {
        self.session(|conn| {
            let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
            let mut stmt = conn.prepare(
                "SELECT price_per_passenger FROM flight_prices
                 WHERE search_definition_id = ?1 AND scraped_at >= ?2 AND is_suspicious = 0
                 ORDER BY scraped_at DESC",
            )?;
            stmt.query_map(params![search_definition_id, cutoff], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<f64>>>()
        })
    }

    /// Rows from the last `days` with `confidence >= deal_min` and not
    /// suspicious, newest first — the candidate pool for deal selection
    /// (§4.G.8).
    pub fn deal_candidate_prices(
        &self,
        search_definition_id: i64,
        days: i64,
        deal_min_confidence: f64,
    ) -> Result<Vec<FlightPrice>> {
        self.session(|conn| {
            let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
            let mut stmt = conn.prepare(
                "SELECT id, search_definition_id, departure_date, return_date, price_per_passenger,
                        passenger_count, total_price, trip_type, currency, source_tag, confidence,
                        is_suspicious, airline, stops, duration_minutes, layover_airports_json, NULL, scraped_at
                 FROM flight_prices
                 WHERE search_definition_id = ?1 AND scraped_at >= ?2
                       AND is_suspicious = 0 AND confidence >= ?3
                 ORDER BY scraped_at DESC",
            )?;
            stmt.query_map(params![search_definition_id, cutoff, deal_min_confidence], row_to_flight_price)?
                .collect::<rusqlite::Result<Vec<FlightPrice>>>()
        })
    }

    pub fn thirty_day_median(&self, search_definition_id: i64) -> Result<Option<f64>> {
        let mut prices = self.recent_prices(search_definition_id, 30)?;
        if prices.is_empty() {
            return Ok(None);
        }
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = prices.len() / 2;
        Ok(Some(if prices.len() % 2 == 0 {
            (prices[mid - 1] + prices[mid]) / 2.0
        } else {
            prices[mid]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightPrice;
    use chrono::NaiveDate;

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
    fn inserts_and_reads_back_recent_prices() {
        let db = Database::open_in_memory().unwrap();
        seed_search_definition(&db);
        let price = FlightPrice::new(
            1,
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            None,
            899.0,
            1,
            "NZD",
            TripType::RoundTrip,
            "serpapi",
            0.9,
        )
        .unwrap();
        db.insert_flight_price(&price).unwrap();

        let recent = db.recent_prices(1, 30).unwrap();
        assert_eq!(recent, vec![899.0]);
        assert_eq!(db.thirty_day_median(1).unwrap(), Some(899.0));
    }

    #[test]
    fn deal_candidates_exclude_suspicious_and_low_confidence() {
        let db = Database::open_in_memory().unwrap();
        seed_search_definition(&db);
        let mut low_conf = FlightPrice::new(
            1,
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            None,
            500.0,
            1,
            "NZD",
            TripType::RoundTrip,
            "serpapi",
            0.4,
        )
        .unwrap();
        low_conf.confidence = 0.4;
        db.insert_flight_price(&low_conf).unwrap();

        let candidates = db.deal_candidate_prices(1, 30, 0.6).unwrap();
        assert!(candidates.is_empty());
    }
}
