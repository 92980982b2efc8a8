//! Airport Catalog (§4.A): a static, process-lifetime lookup table loaded
//! once at startup from an OpenFlights-format `airports.dat` CSV, with a
//! hardcoded fallback table when that file is missing or unparsable.
//!
//! Grounded on `original_source/backend/app/services/airports.py`; lat/lon
//! are carried here even though that file's dataclass omitted them, since
//! `nearby()` needs them and the CSV the original reads from does carry them
//! (columns 6/7) — see DESIGN.md Open Question resolution 7.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// (country, lowercased IANA timezone prefix) overrides the timezone-prefix
/// heuristic gets wrong.
const COUNTRY_REGION_OVERRIDES: &[(&str, &str)] = &[
    ("Brazil", "South America"),
    ("Argentina", "South America"),
    ("Chile", "South America"),
    ("Peru", "South America"),
    ("Colombia", "South America"),
    ("Venezuela", "South America"),
    ("Ecuador", "South America"),
    ("Bolivia", "South America"),
    ("Paraguay", "South America"),
    ("Uruguay", "South America"),
    ("Mexico", "North America"),
    ("United States", "North America"),
    ("Canada", "North America"),
];

const TIMEZONE_TO_REGION: &[(&str, &str)] = &[
    ("Pacific/", "Oceania"),
    ("Australia/", "Oceania"),
    ("Asia/", "Asia"),
    ("Europe/", "Europe"),
    ("America/", "North America"),
    ("Africa/", "Africa"),
    ("Atlantic/", "Europe"),
    ("Indian/", "Africa"),
];

fn infer_region(country: &str, timezone: &str) -> String {
    for (c, region) in COUNTRY_REGION_OVERRIDES {
        if *c == country {
            return region.to_string();
        }
    }
    for (prefix, region) in TIMEZONE_TO_REGION {
        if timezone.starts_with(prefix) {
            return region.to_string();
        }
    }
    "Unknown".to_string()
}

/// `(code, name, city, country, region, lat, lon)` — ~40 major hubs, used
/// when the OpenFlights CSV is unavailable.
const FALLBACK_AIRPORTS: &[(&str, &str, &str, &str, &str, f64, f64)] = &[
    ("AKL", "Auckland International", "Auckland", "New Zealand", "Oceania", -37.0082, 174.7850),
    ("WLG", "Wellington International", "Wellington", "New Zealand", "Oceania", -41.3272, 174.8050),
    ("CHC", "Christchurch International", "Christchurch", "New Zealand", "Oceania", -43.4894, 172.5320),
    ("SYD", "Sydney", "Sydney", "Australia", "Oceania", -33.9461, 151.1772),
    ("MEL", "Melbourne", "Melbourne", "Australia", "Oceania", -37.6690, 144.8410),
    ("BNE", "Brisbane", "Brisbane", "Australia", "Oceania", -27.3842, 153.1175),
    ("NAN", "Nadi", "Nadi", "Fiji", "Oceania", -17.7554, 177.4434),
    ("LAX", "Los Angeles International", "Los Angeles", "United States", "North America", 33.9425, -118.4081),
    ("SFO", "San Francisco International", "San Francisco", "United States", "North America", 37.6189, -122.3750),
    ("JFK", "John F Kennedy", "New York", "United States", "North America", 40.6398, -73.7789),
    ("ORD", "O'Hare", "Chicago", "United States", "North America", 41.9786, -87.9048),
    ("DFW", "Dallas Fort Worth", "Dallas", "United States", "North America", 32.8968, -97.0380),
    ("SEA", "Seattle-Tacoma", "Seattle", "United States", "North America", 47.4490, -122.3093),
    ("MIA", "Miami International", "Miami", "United States", "North America", 25.7959, -80.2870),
    ("BOS", "Logan International", "Boston", "United States", "North America", 42.3656, -71.0096),
    ("DEN", "Denver International", "Denver", "United States", "North America", 39.8561, -104.6737),
    ("ATL", "Hartsfield-Jackson", "Atlanta", "United States", "North America", 33.6407, -84.4277),
    ("IAD", "Dulles", "Washington", "United States", "North America", 38.9531, -77.4565),
    ("PDX", "Portland International", "Portland", "United States", "North America", 45.5898, -122.5951),
    ("PHX", "Phoenix Sky Harbor", "Phoenix", "United States", "North America", 33.4352, -112.0101),
    ("LAS", "Harry Reid", "Las Vegas", "United States", "North America", 36.0840, -115.1537),
    ("HNL", "Honolulu", "Honolulu", "United States", "North America", 21.3245, -157.9251),
    ("LHR", "Heathrow", "London", "United Kingdom", "Europe", 51.4700, -0.4543),
    ("CDG", "Charles de Gaulle", "Paris", "France", "Europe", 49.0097, 2.5479),
    ("AMS", "Schiphol", "Amsterdam", "Netherlands", "Europe", 52.3105, 4.7683),
    ("FRA", "Frankfurt", "Frankfurt", "Germany", "Europe", 50.0379, 8.5622),
    ("FCO", "Fiumicino", "Rome", "Italy", "Europe", 41.8003, 12.2389),
    ("MXP", "Malpensa", "Milan", "Italy", "Europe", 45.6306, 8.7281),
    ("MAD", "Barajas", "Madrid", "Spain", "Europe", 40.4983, -3.5676),
    ("BCN", "El Prat", "Barcelona", "Spain", "Europe", 41.2971, 2.0785),
    ("DXB", "Dubai International", "Dubai", "United Arab Emirates", "Asia", 25.2532, 55.3657),
    ("SIN", "Changi", "Singapore", "Singapore", "Asia", 1.3644, 103.9915),
    ("HKG", "Hong Kong", "Hong Kong", "Hong Kong", "Asia", 22.3080, 113.9185),
    ("NRT", "Narita", "Tokyo", "Japan", "Asia", 35.7647, 140.3864),
    ("ICN", "Incheon", "Seoul", "South Korea", "Asia", 37.4602, 126.4407),
    ("BKK", "Suvarnabhumi", "Bangkok", "Thailand", "Asia", 13.6900, 100.7501),
    ("MNL", "Ninoy Aquino", "Manila", "Philippines", "Asia", 14.5086, 121.0194),
    ("SJU", "Luis Munoz Marin", "San Juan", "Puerto Rico", "North America", 18.4394, -66.0018),
    ("LIH", "Lihue", "Kauai", "United States", "North America", 21.9760, -159.3390),
    ("RAR", "Rarotonga International", "Rarotonga", "Cook Islands", "Oceania", -21.2027, -159.8055),
];

/// Proximity/country/region catalog keyed by IATA code, built once at
/// startup and consulted read-only for the rest of the process lifetime.
pub struct AirportCatalog {
    by_code: HashMap<String, Airport>,
    city_to_codes: HashMap<String, Vec<String>>,
}

impl AirportCatalog {
    /// Loads from an OpenFlights `airports.dat`-format CSV (no header row;
    /// columns per §4.A: 1=name, 2=city, 3=country, 4=IATA, 6=lat, 7=lon,
    /// 11=timezone). Falls back to [`AirportCatalog::fallback`] and logs a
    /// warning if the file is missing, unreadable, or yields zero airports.
    pub fn load_from_csv(path: &str) -> Self {
        match Self::try_load_from_csv(path) {
            Ok(catalog) if !catalog.by_code.is_empty() => {
                tracing::info!(count = catalog.by_code.len(), path, "loaded airport catalog");
                catalog
            }
            Ok(_) => {
                tracing::warn!(path, "airport CSV produced zero rows, using fallback");
                Self::fallback()
            }
            Err(err) => {
                tracing::warn!(path, %err, "failed to load airport CSV, using fallback");
                Self::fallback()
            }
        }
    }

    fn try_load_from_csv(path: &str) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut catalog = Self { by_code: HashMap::new(), city_to_codes: HashMap::new() };
        for line in contents.lines() {
            let cols = parse_csv_line(line);
            if cols.len() < 12 {
                continue;
            }
            let code = cols[4].trim();
            if code.is_empty() || code == "\\N" || code.len() != 3 {
                continue;
            }
            let (Ok(lat), Ok(lon)) = (cols[6].trim().parse::<f64>(), cols[7].trim().parse::<f64>()) else {
                continue;
            };
            let country = cols[3].trim().to_string();
            let timezone = cols[11].trim().to_string();
            let airport = Airport {
                code: code.to_string(),
                name: cols[1].trim().to_string(),
                city: cols[2].trim().to_string(),
                region: infer_region(&country, &timezone),
                country,
                latitude: lat,
                longitude: lon,
            };
            catalog.insert(airport);
        }
        Ok(catalog)
    }

    pub fn fallback() -> Self {
        let mut catalog = Self { by_code: HashMap::new(), city_to_codes: HashMap::new() };
        for (code, name, city, country, region, lat, lon) in FALLBACK_AIRPORTS {
            catalog.insert(Airport {
                code: code.to_string(),
                name: name.to_string(),
                city: city.to_string(),
                country: country.to_string(),
                region: region.to_string(),
                latitude: *lat,
                longitude: *lon,
            });
        }
        catalog
    }

    fn insert(&mut self, airport: Airport) {
        let city_lower = airport.city.to_lowercase();
        let codes = self.city_to_codes.entry(city_lower).or_default();
        if !codes.contains(&airport.code) {
            codes.push(airport.code.clone());
        }
        self.by_code.insert(airport.code.clone(), airport);
    }

    pub fn lookup(&self, code: &str) -> Option<&Airport> {
        self.by_code.get(&code.to_uppercase())
    }

    pub fn is_valid(&self, code: &str) -> bool {
        code.len() == 3 && self.lookup(code).is_some()
    }

    /// Scored search across code/city/country/name. Tiers per §4.A: exact
    /// code 100, exact city/name 90, code prefix 85, city/name prefix 70,
    /// city/name substring 50, code substring 40, region substring 30.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Airport> {
        if query.len() < 2 {
            return Vec::new();
        }
        let q = query.to_lowercase();
        if query.len() == 3 {
            if let Some(airport) = self.lookup(query) {
                return vec![airport];
            }
        }

        let mut scored: Vec<(i32, &Airport)> = self
            .by_code
            .values()
            .filter_map(|airport| {
                let code_l = airport.code.to_lowercase();
                let city_l = airport.city.to_lowercase();
                let name_l = airport.name.to_lowercase();
                let country_l = airport.country.to_lowercase();
                let region_l = airport.region.to_lowercase();

                let score = if code_l == q {
                    100
                } else if city_l == q || name_l == q {
                    90
                } else if code_l.starts_with(&q) {
                    85
                } else if city_l.starts_with(&q) || name_l.starts_with(&q) {
                    70
                } else if city_l.contains(&q) || name_l.contains(&q) {
                    50
                } else if code_l.contains(&q) || country_l.contains(&q) {
                    40
                } else if region_l.contains(&q) {
                    30
                } else {
                    0
                };
                (score > 0).then_some((score, airport))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.city.cmp(&b.1.city)));
        scored.into_iter().take(limit).map(|(_, a)| a).collect()
    }

    /// Great-circle distance via haversine, filtered to `radius_km` and
    /// sorted nearest-first. `code` itself is excluded from the results.
    pub fn nearby(&self, code: &str, radius_km: f64) -> Vec<(&Airport, f64)> {
        let Some(origin) = self.lookup(code) else { return Vec::new() };
        let mut results: Vec<(&Airport, f64)> = self
            .by_code
            .values()
            .filter(|a| a.code != origin.code)
            .map(|a| (a, haversine_km(origin.latitude, origin.longitude, a.latitude, a.longitude)))
            .filter(|(_, d)| *d <= radius_km)
            .collect();
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results
    }

    pub fn by_country(&self, country: &str) -> Vec<&Airport> {
        self.by_code.values().filter(|a| a.country.eq_ignore_ascii_case(country)).collect()
    }

    pub fn by_region(&self, region: &str) -> Vec<&Airport> {
        self.by_code.values().filter(|a| a.region.eq_ignore_ascii_case(region)).collect()
    }

    pub fn code_for_city(&self, city: &str) -> Option<&str> {
        let city_lower = city.to_lowercase();
        self.city_to_codes.get(&city_lower).and_then(|codes| codes.first()).map(String::as_str)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) =
        (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Minimal unquoted/quoted CSV split, matching what `airports.dat` needs
/// (no embedded commas inside quoted fields beyond plain city/name text).
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_contains_home_hub() {
        let catalog = AirportCatalog::fallback();
        let akl = catalog.lookup("akl").expect("AKL should be in fallback table");
        assert_eq!(akl.city, "Auckland");
        assert_eq!(akl.region, "Oceania");
    }

    #[test]
    fn search_ranks_exact_code_above_substring() {
        let catalog = AirportCatalog::fallback();
        let results = catalog.search("syd", 5);
        assert_eq!(results[0].code, "SYD");
    }

    #[test]
    fn nearby_excludes_self_and_respects_radius() {
        let catalog = AirportCatalog::fallback();
        let results = catalog.nearby("AKL", 5000.0);
        assert!(results.iter().all(|(a, _)| a.code != "AKL"));
        assert!(results.iter().any(|(a, _)| a.code == "WLG"));
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn by_region_and_country_filter_case_insensitively() {
        let catalog = AirportCatalog::fallback();
        assert!(catalog.by_region("oceania").len() >= 3);
        assert!(catalog.by_country("new zealand").len() >= 3);
    }

    #[test]
    fn code_for_city_resolves_lowercase_lookup() {
        let catalog = AirportCatalog::fallback();
        assert_eq!(catalog.code_for_city("Auckland"), Some("AKL"));
        assert_eq!(catalog.code_for_city("Nowhere"), None);
    }
}
