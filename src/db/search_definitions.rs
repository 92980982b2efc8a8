use super::Database;
use crate::models::{SearchDates, SearchDefinition};
use crate::{CabinClass, Result, StopsFilter, TripType};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Row};
use std::str::FromStr;

#[derive(serde::Serialize, serde::Deserialize)]
enum DatesRepr {
    Fixed { start: NaiveDate, end: NaiveDate },
    Rolling { days_min: i64, days_max: i64, dur_min: i64, dur_max: i64 },
}

fn dates_to_json(dates: &SearchDates) -> String {
    let repr = match dates {
        SearchDates::Fixed { departure_date_start, departure_date_end } => {
            DatesRepr::Fixed { start: *departure_date_start, end: *departure_date_end }
        }
        SearchDates::Rolling {
            departure_days_min,
            departure_days_max,
            trip_duration_days_min,
            trip_duration_days_max,
        } => DatesRepr::Rolling {
            days_min: *departure_days_min,
            days_max: *departure_days_max,
            dur_min: *trip_duration_days_min,
            dur_max: *trip_duration_days_max,
        },
    };
    serde_json::to_string(&repr).unwrap_or_default()
}

fn dates_from_json(s: &str) -> Result<SearchDates> {
    let repr: DatesRepr = serde_json::from_str(s)?;
    Ok(match repr {
        DatesRepr::Fixed { start, end } => {
            SearchDates::Fixed { departure_date_start: start, departure_date_end: end }
        }
        DatesRepr::Rolling { days_min, days_max, dur_min, dur_max } => SearchDates::Rolling {
            departure_days_min: days_min,
            departure_days_max: days_max,
            trip_duration_days_min: dur_min,
            trip_duration_days_max: dur_max,
        },
    })
}

fn row_to_search_definition(row: &Row) -> rusqlite::Result<SearchDefinition> {
    let trip_type_raw: String = row.get(2)?;
    let dates_json: String = row.get(3)?;
    let cabin_raw: String = row.get(8)?;
    let stops_raw: String = row.get(9)?;

    let trip_type = TripType::from_str(&trip_type_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    let dates = dates_from_json(&dates_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    let cabin_class = CabinClass::from_str(&cabin_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?;
    let stops_filter = StopsFilter::from_str(&stops_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(SearchDefinition {
        id: row.get(0)?,
        origin: row.get(1)?,
        destination: row.get(11)?,
        trip_type,
        dates,
        adults: row.get(4)?,
        children: row.get(5)?,
        infants_in_seat: row.get(6)?,
        infants_on_lap: row.get(7)?,
        cabin_class,
        stops_filter,
        include_airlines: Vec::new(),
        exclude_airlines: Vec::new(),
        currency: row.get(10)?,
        locale: "en-US".to_string(),
        carry_on_bags: 0,
        checked_bags: 0,
        name: None,
        is_active: row.get(12)?,
        scrape_frequency_hours: 12,
        preferred_source: row.get(13)?,
        version: 1,
        parent_id: None,
    })
}

impl Database {
    pub fn load_search_definition(&self, id: i64) -> Result<SearchDefinition> {
        self.session(|conn| {
            conn.query_row(
                "SELECT id, origin, trip_type, dates_json, adults, children, infants_in_seat,
                        infants_on_lap, cabin_class, stops_filter, currency, destination,
                        is_active, preferred_source
                 FROM search_definitions WHERE id = ?1",
                params![id],
                row_to_search_definition,
            )
        })
    }

    pub fn active_search_definition_ids(&self) -> Result<Vec<i64>> {
        self.session(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM search_definitions WHERE is_active = 1")?;
            stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()
        })
    }

    /// Inserts a new search definition and returns its id. Used by trip-plan
    /// search's "pseudo search" synthesis (§4.H) and by user-initiated
    /// creation.
    pub fn insert_search_definition(&self, def: &SearchDefinition) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.session(|conn| {
            conn.execute(
                "INSERT INTO search_definitions (
                    origin, destination, trip_type, dates_json, adults, children,
                    infants_in_seat, infants_on_lap, cabin_class, stops_filter, currency,
                    is_active, preferred_source, created_at, updated_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?14)",
                params![
                    def.origin,
                    def.destination,
                    def.trip_type.to_string(),
                    dates_to_json(&def.dates),
                    def.adults,
                    def.children,
                    def.infants_in_seat,
                    def.infants_on_lap,
                    def.cabin_class.to_string(),
                    def.stops_filter.to_string(),
                    def.currency,
                    def.is_active,
                    def.preferred_source,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchDefinition;

    #[test]
    fn round_trips_a_rolling_search_definition() {
        let db = Database::open_in_memory().unwrap();
        let def = SearchDefinition::new(
            0,
            "AKL",
            "NRT",
            TripType::RoundTrip,
            SearchDates::Rolling {
                departure_days_min: 30,
                departure_days_max: 90,
                trip_duration_days_min: 7,
                trip_duration_days_max: 14,
            },
            1,
            0,
            0,
            0,
            CabinClass::Economy,
            StopsFilter::Any,
            "NZD",
        )
        .unwrap();

        let id = db.insert_search_definition(&def).unwrap();
        let reloaded = db.load_search_definition(id).unwrap();
        assert_eq!(reloaded.origin, "AKL");
        assert!(matches!(reloaded.dates, SearchDates::Rolling { departure_days_min: 30, .. }));
    }
}
