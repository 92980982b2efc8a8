//! Persistence layer: a pooled `rusqlite` connection behind a scoped-session
//! wrapper, grounded on `fast-gateway-protocol-fgp/sqlite`'s
//! `rusqlite(bundled) + parking_lot` pairing.
//!
//! Every accessor goes through [`Database::session`], which hands out a
//! guard holding the mutex for the duration of one closure and is the only
//! place a `Connection` reference escapes into calling code — matching §5's
//! "every read/write through a scoped session with guaranteed close".

mod backup;
mod flight_prices;
mod health;
mod schema;
mod search_definitions;
mod trip_plans;
mod user_settings;

pub use backup::BackupOutcome;

pub use schema::init_schema;

use crate::{Result, WalkaboutError};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if necessary) the SQLite file at `path`, turns on
    /// foreign-key enforcement as required by §5, and applies the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` with exclusive access to the connection. `f` is synchronous
    /// (rusqlite is synchronous); async call sites dispatch this through
    /// `tokio::task::spawn_blocking`.
    pub fn session<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn).map_err(WalkaboutError::from)
    }

    /// Run `f` inside an explicit transaction: on an `Err` return the
    /// transaction rolls back (error kind 7 — persistence failures must not
    /// leave partial writes behind).
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .session(|conn| {
                conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='search_definitions'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
