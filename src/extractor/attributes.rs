//! Airline/stops/duration/layover extractors (§4.C): analogous ranked
//! strategies to price.rs, each with an intrinsic confidence, scoped to a
//! single candidate row.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

const AIRLINE_SELECTORS: &[(&str, f64)] = &[
    ("div.sSHqwe.tPgKwe.ogfYpf span", 0.90),
    (".NZRfve", 0.75),
    ("img[alt]", 0.55),
];

static STOPS_NONSTOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nonstop|non-stop").unwrap());
static STOPS_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+stops?").unwrap());
const STOPS_SELECTORS: &[(&str, f64)] = &[(".BbR8Ec .ogfYpf", 0.85), ("[aria-label*='stop']", 0.65)];

static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*h(?:r|rs)?\s*(?:(\d+)\s*m)?").unwrap());
const DURATION_SELECTORS: &[(&str, f64)] = &[("div.Ak5kof div", 0.85), ("[aria-label*='Total duration']", 0.65)];

static LAYOVER_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{3})\b").unwrap());
const LAYOVER_SELECTOR: &str = "span.PTuQse span[jscontroller]";

fn first_text_match(row: &ElementRef, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    row.select(&sel).next().map(|el| el.text().collect::<String>().trim().to_string())
}

pub fn extract_airline(row: &ElementRef) -> (Option<String>, f64) {
    for (selector, confidence) in AIRLINE_SELECTORS {
        if let Some(text) = first_text_match(row, selector) {
            if !text.is_empty() {
                return (Some(text), *confidence);
            }
        }
    }
    (None, 0.0)
}

pub fn extract_stops(row: &ElementRef) -> (Option<i32>, f64) {
    for (selector, confidence) in STOPS_SELECTORS {
        if let Some(text) = first_text_match(row, selector) {
            if STOPS_NONSTOP_RE.is_match(&text) {
                return (Some(0), *confidence);
            }
            if let Some(caps) = STOPS_COUNT_RE.captures(&text) {
                if let Ok(count) = caps[1].parse() {
                    return (Some(count), *confidence);
                }
            }
        }
    }
    let row_text = row.text().collect::<String>();
    if STOPS_NONSTOP_RE.is_match(&row_text) {
        return (Some(0), 0.5);
    }
    (None, 0.0)
}

pub fn extract_duration(row: &ElementRef) -> (Option<i32>, f64) {
    for (selector, confidence) in DURATION_SELECTORS {
        if let Some(text) = first_text_match(row, selector) {
            if let Some(minutes) = parse_duration_text(&text) {
                return (Some(minutes), *confidence);
            }
        }
    }
    (None, 0.0)
}

fn parse_duration_text(text: &str) -> Option<i32> {
    let caps = DURATION_RE.captures(text)?;
    let hours: i32 = caps[1].parse().ok()?;
    let minutes: i32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    Some(hours * 60 + minutes)
}

/// Ordered list of layover IATA codes, comma-joined per §4.C. Only codes
/// after the first (origin) and before the last (destination) count as
/// layovers.
pub fn extract_layovers(row: &ElementRef) -> Option<String> {
    let Ok(sel) = Selector::parse(LAYOVER_SELECTOR) else { return None };
    let codes: Vec<String> = row
        .select(&sel)
        .filter_map(|el| {
            let text = el.text().collect::<String>();
            LAYOVER_CODE_RE.captures(&text).map(|c| c[1].to_string())
        })
        .collect();
    if codes.len() > 2 {
        Some(codes[1..codes.len() - 1].join(","))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_and_minutes_duration_text() {
        assert_eq!(parse_duration_text("11 hr 40 min"), Some(700));
        assert_eq!(parse_duration_text("2 hr"), Some(120));
        assert_eq!(parse_duration_text("garbage"), None);
    }

    #[test]
    fn nonstop_regex_matches_either_spelling() {
        assert!(STOPS_NONSTOP_RE.is_match("Nonstop"));
        assert!(STOPS_NONSTOP_RE.is_match("non-stop flight"));
        assert!(!STOPS_NONSTOP_RE.is_match("1 stop"));
    }
}
