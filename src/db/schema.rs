use rusqlite::{Connection, Result};

/// Idempotent schema creation, run once per `Database::open`. Mirrors the
/// table shapes implied by the ORM models in `original_source/backend/app/models`,
/// adapted to the Rust structs in `crate::models`.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS search_definitions (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            origin                  TEXT NOT NULL,
            destination             TEXT NOT NULL,
            trip_type               TEXT NOT NULL,
            dates_json              TEXT NOT NULL,
            adults                  INTEGER NOT NULL,
            children                INTEGER NOT NULL,
            infants_in_seat         INTEGER NOT NULL,
            infants_on_lap          INTEGER NOT NULL,
            cabin_class             TEXT NOT NULL,
            stops_filter            TEXT NOT NULL,
            currency                TEXT NOT NULL,
            is_active               INTEGER NOT NULL DEFAULT 1,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS flight_prices (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            search_definition_id    INTEGER NOT NULL REFERENCES search_definitions(id) ON DELETE CASCADE,
            departure_date          TEXT NOT NULL,
            return_date             TEXT,
            price_per_passenger     REAL NOT NULL,
            passenger_count         INTEGER NOT NULL,
            total_price             REAL NOT NULL,
            currency                TEXT NOT NULL,
            trip_type               TEXT NOT NULL,
            source_tag              TEXT NOT NULL,
            confidence              REAL NOT NULL,
            is_suspicious           INTEGER NOT NULL DEFAULT 0,
            airline                 TEXT,
            stops                   INTEGER,
            duration_minutes        INTEGER,
            layover_airports_json   TEXT,
            scraped_at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_flight_prices_search_def
            ON flight_prices(search_definition_id, scraped_at);
        CREATE INDEX IF NOT EXISTS idx_flight_prices_departure
            ON flight_prices(search_definition_id, departure_date);
        CREATE INDEX IF NOT EXISTS idx_flight_prices_scraped_at
            ON flight_prices(scraped_at);
        CREATE INDEX IF NOT EXISTS idx_search_definitions_route
            ON search_definitions(origin, destination);

        CREATE TABLE IF NOT EXISTS scrape_health (
            search_definition_id        INTEGER PRIMARY KEY REFERENCES search_definitions(id) ON DELETE CASCADE,
            consecutive_failures         INTEGER NOT NULL DEFAULT 0,
            total_successes              INTEGER NOT NULL DEFAULT 0,
            total_failures               INTEGER NOT NULL DEFAULT 0,
            last_success_at              TEXT,
            last_failure_at              TEXT,
            last_failure_reason          TEXT,
            last_failure_message         TEXT,
            last_screenshot_path         TEXT,
            last_html_snapshot_path      TEXT,
            circuit_open                 INTEGER NOT NULL DEFAULT 0,
            last_alert_sent_at           TEXT
        );

        CREATE TABLE IF NOT EXISTS trip_plans (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            name                    TEXT NOT NULL,
            origins_json            TEXT NOT NULL DEFAULT '[]',
            destinations_json       TEXT NOT NULL DEFAULT '[]',
            earliest_departure      TEXT,
            latest_departure        TEXT,
            trip_duration_days_min  INTEGER,
            trip_duration_days_max  INTEGER,
            budget_amount           REAL,
            budget_currency         TEXT,
            cabin_classes_json      TEXT NOT NULL DEFAULT '[]',
            max_stops               INTEGER,
            is_active               INTEGER NOT NULL DEFAULT 1,
            search_in_progress      INTEGER NOT NULL DEFAULT 0,
            search_started_at       TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS trip_plan_matches (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_plan_id            INTEGER NOT NULL REFERENCES trip_plans(id) ON DELETE CASCADE,
            source                  TEXT NOT NULL,
            deal_id                 INTEGER,
            origin                  TEXT NOT NULL,
            destination             TEXT NOT NULL,
            departure_date          TEXT NOT NULL,
            return_date             TEXT,
            price                   REAL NOT NULL,
            original_price          REAL,
            original_currency       TEXT,
            airline                 TEXT,
            stops                   INTEGER NOT NULL DEFAULT 0,
            duration_minutes        INTEGER,
            booking_url             TEXT,
            match_score             REAL NOT NULL,
            deal_title              TEXT,
            found_at                TEXT NOT NULL,
            UNIQUE(trip_plan_id, origin, destination, departure_date, return_date)
        );

        CREATE TABLE IF NOT EXISTS deals (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            source                  TEXT NOT NULL,
            link                    TEXT NOT NULL UNIQUE,
            published_at            TEXT,
            raw_title               TEXT NOT NULL,
            raw_summary             TEXT,
            parsed_origin           TEXT,
            parsed_destination      TEXT,
            parsed_price            INTEGER,
            parsed_currency         TEXT,
            parsed_airline          TEXT,
            parsed_cabin_class      TEXT,
            parse_status            TEXT NOT NULL,
            is_relevant             INTEGER NOT NULL DEFAULT 0,
            score                   REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS tracked_award_searches (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            origin                  TEXT NOT NULL,
            destination             TEXT NOT NULL,
            program                 TEXT,
            date_start              TEXT,
            date_end                TEXT,
            cabin_class             TEXT NOT NULL,
            min_seats               INTEGER NOT NULL DEFAULT 1,
            direct_only             INTEGER NOT NULL DEFAULT 0,
            is_active               INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS award_observations (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            tracked_search_id       INTEGER NOT NULL REFERENCES tracked_award_searches(id) ON DELETE CASCADE,
            observed_at             TEXT NOT NULL,
            result_hash             TEXT NOT NULL,
            best_miles_economy      INTEGER,
            best_miles_business     INTEGER,
            max_seats               INTEGER,
            programs_seen_json      TEXT NOT NULL DEFAULT '[]',
            raw_payload              TEXT
        );

        CREATE TABLE IF NOT EXISTS user_settings (
            id                                  INTEGER PRIMARY KEY CHECK (id = 1),
            home_airports_json                  TEXT NOT NULL,
            home_region                         TEXT NOT NULL,
            watched_destinations_json           TEXT NOT NULL,
            watched_regions_json                TEXT NOT NULL,
            preferred_currency                  TEXT NOT NULL,
            notifications_enabled               INTEGER NOT NULL,
            notification_provider               TEXT NOT NULL,
            notification_ntfy_url               TEXT,
            notification_ntfy_topic             TEXT,
            notification_discord_webhook        TEXT,
            notification_min_discount_percent   INTEGER NOT NULL,
            quiet_hours_start                   INTEGER,
            quiet_hours_end                     INTEGER,
            notification_cooldown_minutes       INTEGER NOT NULL,
            timezone                            TEXT NOT NULL,
            notify_deals                        INTEGER NOT NULL,
            notify_trip_matches                 INTEGER NOT NULL,
            notify_route_updates                INTEGER NOT NULL,
            notify_system                       INTEGER NOT NULL,
            deal_notify_min_rating               INTEGER NOT NULL,
            deal_notify_categories_json          TEXT NOT NULL,
            deal_notify_cabin_classes_json       TEXT NOT NULL,
            deal_cooldown_minutes               INTEGER NOT NULL,
            trip_cooldown_hours                 INTEGER NOT NULL,
            route_cooldown_hours                INTEGER NOT NULL,
            daily_digest_enabled                INTEGER NOT NULL,
            daily_digest_hour                   INTEGER NOT NULL
        );
        "#,
    )
}
