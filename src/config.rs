//! Process-wide configuration, loaded once at boot.
//!
//! Replaces the `get_settings()` `lru_cache`-backed singleton the original
//! service used: `Settings` is read from the environment exactly once, in
//! `Settings::load`, and handed down by reference from `main`. Nothing in
//! this crate re-reads the environment from inside a hot path.

use std::sync::OnceLock;

/// Top-level process configuration. Field set mirrors the original
/// service's `Settings` one-for-one (env var names match).
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: String,
    pub database_url: String,

    pub scheduler_enabled: bool,
    pub scrape_frequency_hours: u32,
    pub timezone: String,

    pub seats_aero_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,

    pub serpapi_key: Option<String>,
    pub skyscanner_api_key: Option<String>,
    pub amadeus_client_id: Option<String>,
    pub amadeus_client_secret: Option<String>,
    pub amadeus_base_url: String,

    pub ntfy_url: String,
    pub ntfy_topic: String,
    pub discord_webhook: Option<String>,
    pub base_url: String,

    pub deal_threshold_z_score: f64,
    pub min_history_for_analysis: usize,
    pub price_anomaly_threshold_percent: f64,

    pub data_dir: String,

    pub backup_enabled: bool,
    pub backup_interval_hours: u32,
    pub backup_max_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("production deployments require an explicit non-SQLite DATABASE_URL")]
    SqliteInProduction,
}

impl Settings {
    /// Build `Settings` from the process environment, loading a `.env` file
    /// first if present (grounded on `fast-gateway-protocol-fgp/registry`'s
    /// `dotenvy` use). Applies the same production guard as the original
    /// `Settings.model_post_init`: a `prod` environment may not point at a
    /// SQLite URL.
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        fn env_string(key: &str, default: &str) -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        }
        fn env_opt(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        }
        fn env_bool(key: &str, default: bool) -> bool {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        let settings = Settings {
            env: env_string("ENV", "dev"),
            database_url: env_string("DATABASE_URL", "sqlite://./data/walkabout.db"),
            scheduler_enabled: env_bool("SCHEDULER_ENABLED", true),
            scrape_frequency_hours: env_num("SCRAPE_FREQUENCY_HOURS", 12),
            timezone: env_string("TZ", "UTC"),
            seats_aero_api_key: env_opt("SEATS_AERO_API_KEY"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            serpapi_key: env_opt("SERPAPI_KEY"),
            skyscanner_api_key: env_opt("SKYSCANNER_API_KEY"),
            amadeus_client_id: env_opt("AMADEUS_CLIENT_ID"),
            amadeus_client_secret: env_opt("AMADEUS_CLIENT_SECRET"),
            amadeus_base_url: env_string("AMADEUS_BASE_URL", "https://test.api.amadeus.com"),
            ntfy_url: env_string("NTFY_URL", "http://localhost:8080"),
            ntfy_topic: env_string("NTFY_TOPIC", "walkabout-deals"),
            discord_webhook: env_opt("DISCORD_WEBHOOK"),
            base_url: env_string("BASE_URL", "http://localhost:8000"),
            deal_threshold_z_score: env_num("DEAL_THRESHOLD_Z_SCORE", -1.5),
            min_history_for_analysis: env_num("MIN_HISTORY_FOR_ANALYSIS", 10),
            price_anomaly_threshold_percent: env_num("PRICE_ANOMALY_THRESHOLD_PERCENT", 300.0),
            data_dir: env_string("DATA_DIR", "./data"),
            backup_enabled: env_bool("BACKUP_ENABLED", true),
            backup_interval_hours: env_num("BACKUP_INTERVAL_HOURS", 24),
            backup_max_count: env_num("BACKUP_MAX_COUNT", 7),
        };

        if settings.env == "prod" && settings.database_url.starts_with("sqlite") {
            return Err(ConfigError::SqliteInProduction);
        }

        Ok(settings)
    }

    /// Load once into the process-wide cell and return a static reference.
    /// Subsequent calls return the same instance; this is the only place
    /// `Settings` is ever constructed outside of tests.
    pub fn global() -> &'static Settings {
        static CELL: OnceLock<Settings> = OnceLock::new();
        CELL.get_or_init(|| Self::load().expect("invalid configuration"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_dev_friendly() {
        // Without touching process env, loading should never panic on a
        // clean slate thanks to defaults.
        let settings = Settings {
            env: "dev".into(),
            database_url: "sqlite://./data/walkabout.db".into(),
            scheduler_enabled: true,
            scrape_frequency_hours: 12,
            timezone: "UTC".into(),
            seats_aero_api_key: None,
            anthropic_api_key: None,
            serpapi_key: None,
            skyscanner_api_key: None,
            amadeus_client_id: None,
            amadeus_client_secret: None,
            amadeus_base_url: "https://test.api.amadeus.com".into(),
            ntfy_url: "http://localhost:8080".into(),
            ntfy_topic: "walkabout-deals".into(),
            discord_webhook: None,
            base_url: "http://localhost:8000".into(),
            deal_threshold_z_score: -1.5,
            min_history_for_analysis: 10,
            price_anomaly_threshold_percent: 300.0,
            data_dir: "./data".into(),
            backup_enabled: true,
            backup_interval_hours: 24,
            backup_max_count: 7,
        };
        assert_eq!(settings.scrape_frequency_hours, 12);
    }
}
