use chrono::{DateTime, Utc};

/// Produced by the excluded RSS ingestion component; consumed by the
/// Trip-Plan Matcher (§4.I). This crate only needs the shape of a `Deal` to
/// score it — parsing/classification lives in the out-of-core collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    Partial,
    Failed,
    Pending,
}

#[derive(Debug, Clone)]
pub struct Deal {
    pub id: i64,
    pub source: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,

    pub raw_title: String,
    pub raw_summary: Option<String>,

    pub parsed_origin: Option<String>,
    pub parsed_destination: Option<String>,
    pub parsed_price: Option<i64>,
    pub parsed_currency: Option<String>,
    pub parsed_airline: Option<String>,
    pub parsed_cabin_class: Option<String>,

    pub parse_status: ParseStatus,
    pub is_relevant: bool,
    pub score: f64,
}

impl Deal {
    pub fn is_relevant_to_origin(&self, home_airport: &str) -> bool {
        match &self.parsed_origin {
            Some(origin) => origin.eq_ignore_ascii_case(home_airport),
            None => false,
        }
    }
}
