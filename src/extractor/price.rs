//! Price extraction strategies and the [`PriceValidator`] (§4.C). Patterns
//! that admit bare numbers are explicitly disallowed — a flight number, a
//! year, or a UI badge count would otherwise be picked up as a price.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Each entry: CSS selector, intrinsic confidence, strategy name.
const PRICE_SELECTOR_STRATEGIES: &[(&str, f64, &str)] = &[
    ("span.gOatQ", 0.95, "current_price_selector"),
    (".YMlIz.FpEdX", 0.90, "legacy_price_selector"),
    ("[aria-label*='dollars']", 0.75, "aria_label_price"),
    ("span[data-gs]", 0.60, "data_attribute_price"),
];

/// Currency-symbol-anchored regexes only — a bare `\d{3,5}` pattern is
/// disallowed per §4.C since it would also match flight numbers/years.
static CURRENCY_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$£€¥]\s?([\d,]{3,8})(?:\.\d{2})?").unwrap());
static WORD_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:NZ\$|AU\$|US\$|NZD|AUD|USD)\s?([\d,]{3,8})\b").unwrap());

/// Round numbers that are disproportionately likely to be UI placeholders
/// or counters rather than real prices. Configurable, not purely
/// illustrative — operators may extend this table.
const SUSPICIOUS_CONSTANTS: &[f64] = &[1000.0, 2000.0, 5000.0, 10000.0, 100.0];

pub struct PriceValidator {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceValidator {
    fn default() -> Self {
        Self { min: 20.0, max: 50_000.0 }
    }
}

impl PriceValidator {
    pub fn is_valid(&self, price: f64) -> bool {
        if price < self.min || price > self.max {
            return false;
        }
        !SUSPICIOUS_CONSTANTS.iter().any(|c| (c - price).abs() < f64::EPSILON)
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

/// Tries each row-scoped selector strategy in order, returning the first
/// value that parses and passes [`PriceValidator`].
pub fn extract_price(row: &ElementRef) -> Option<(f64, f64, &'static str)> {
    let validator = PriceValidator::default();

    for (selector, confidence, name) in PRICE_SELECTOR_STRATEGIES {
        let Ok(sel) = Selector::parse(selector) else { continue };
        for el in row.select(&sel) {
            let text = el.text().collect::<String>();
            if let Some(caps) = CURRENCY_PRICE_RE.captures(&text) {
                if let Some(price) = parse_numeric(&caps[1]) {
                    if validator.is_valid(price) {
                        return Some((price, *confidence, name));
                    }
                }
            }
        }
    }

    let row_text = row.text().collect::<String>();
    if let Some(caps) = CURRENCY_PRICE_RE.captures(&row_text) {
        if let Some(price) = parse_numeric(&caps[1]) {
            if validator.is_valid(price) {
                return Some((price, 0.55, "row_text_regex"));
            }
        }
    }
    if let Some(caps) = WORD_PRICE_RE.captures(&row_text) {
        if let Some(price) = parse_numeric(&caps[1]) {
            if validator.is_valid(price) {
                return Some((price, 0.45, "row_text_word_currency_regex"));
            }
        }
    }

    None
}

/// Global regex search across the whole document — the page-level fallback
/// used only when no row yielded a price.
pub fn extract_price_page_level(document: &Html) -> Option<(f64, f64, &'static str)> {
    let validator = PriceValidator::default();
    let text = document.root_element().text().collect::<String>();

    if let Some(caps) = CURRENCY_PRICE_RE.captures(&text) {
        if let Some(price) = parse_numeric(&caps[1]) {
            if validator.is_valid(price) {
                return Some((price, 0.5, "page_level_currency_regex"));
            }
        }
    }
    if let Some(caps) = WORD_PRICE_RE.captures(&text) {
        if let Some(price) = parse_numeric(&caps[1]) {
            if validator.is_valid(price) {
                return Some((price, 0.4, "page_level_word_currency_regex"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_rejects_suspicious_round_constants() {
        let v = PriceValidator::default();
        assert!(!v.is_valid(1000.0));
        assert!(v.is_valid(899.0));
    }

    #[test]
    fn validator_rejects_out_of_range() {
        let v = PriceValidator::default();
        assert!(!v.is_valid(5.0));
        assert!(!v.is_valid(100_000.0));
    }

    #[test]
    fn page_level_extracts_currency_anchored_price() {
        let html = Html::parse_document("<html><body><div>Lowest fare $899 round trip</div></body></html>");
        let (price, _, strategy) = extract_price_page_level(&html).unwrap();
        assert_eq!(price, 899.0);
        assert_eq!(strategy, "page_level_currency_regex");
    }

    #[test]
    fn page_level_ignores_bare_numbers_without_currency_anchor() {
        let html = Html::parse_document("<html><body><div>Flight AA1234 departs in 2026</div></body></html>");
        assert!(extract_price_page_level(&html).is_none());
    }
}
