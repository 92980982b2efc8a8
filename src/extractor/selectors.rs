//! Ranked selector levels (§4.C): L0 Google-specific structural selectors
//! down to L3 DOM-traversal from anchoring elements, each with an a-priori
//! correlation confidence. Grounded on the teacher's
//! `client.rs::FlightResponseParser` selector table, generalized from single
//! fixed selectors into a ranked hierarchy with a documented fallback.

use scraper::{ElementRef, Html, Selector};

pub const L0_CONFIDENCE: f64 = 0.95;
pub const L1_CONFIDENCE: f64 = 0.90;
pub const L2_CONFIDENCE: f64 = 0.90;
pub const L3_CONFIDENCE: f64 = 0.80;
pub const UNKNOWN_CONFIDENCE: f64 = 0.70;

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(sel) => document.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// Returns `(rows, correlation_confidence)` for each level in ranked order.
/// [`super::extract_rows`] stops at the first level that yields any rows.
pub fn candidate_rows(document: &Html) -> Vec<(Vec<ElementRef<'_>>, f64)> {
    vec![
        (select(document, "ul.Rk10dc li"), L0_CONFIDENCE),
        (select(document, "div[role='listitem']"), L1_CONFIDENCE),
        (select(document, "div[role='button'][jsaction]"), L2_CONFIDENCE),
        (select(document, "div.pIav2d"), L3_CONFIDENCE),
        (select(document, "li"), UNKNOWN_CONFIDENCE),
    ]
}
