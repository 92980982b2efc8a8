use chrono::{DateTime, Utc};

/// Loyalty/mileage program identifiers. Values must match Seats.aero's
/// `Source` identifiers (out-of-core collaborator; kept here only so the
/// schema in §6 is complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardProgram {
    Aeroplan,
    Alaska,
    American,
    AsiaMiles,
    ConnectMiles,
    Delta,
    Emirates,
    Etihad,
    Eurobonus,
    FlyingBlue,
    Jetblue,
    LifeMiles,
    Qantas,
    Qatar,
    Saudia,
    Singapore,
    Smiles,
    Turkish,
    United,
    Velocity,
    VirginAtlantic,
    Aeromexico,
}

/// A saved award search to poll periodically (no poller is implemented by
/// this crate — §1 scope).
#[derive(Debug, Clone)]
pub struct TrackedAwardSearch {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub program: Option<AwardProgram>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub cabin_class: String,
    pub min_seats: i32,
    pub direct_only: bool,
    pub is_active: bool,
}

/// One observation of award availability for a `TrackedAwardSearch`.
#[derive(Debug, Clone)]
pub struct AwardObservation {
    pub id: i64,
    pub tracked_search_id: i64,
    pub observed_at: DateTime<Utc>,
    /// Hash of the normalized result set, used for change detection between
    /// consecutive polls without storing or diffing the full payload.
    pub result_hash: String,
    pub best_miles_economy: Option<i64>,
    pub best_miles_business: Option<i64>,
    pub max_seats: Option<i32>,
    pub programs_seen: Vec<AwardProgram>,
    pub raw_payload: Option<String>,
}
