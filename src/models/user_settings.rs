/// Per-§9 redesign: this is no longer a `get_or_create` lazy singleton. It is
/// loaded once at boot (by `db::load_user_settings`) into the value the rest
/// of the crate is handed, and explicitly reloaded only after an admin write.
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub home_airports: Vec<String>,
    pub home_region: String,

    pub watched_destinations: Vec<String>,
    pub watched_regions: Vec<String>,

    pub preferred_currency: String,

    pub notifications_enabled: bool,
    pub notification_provider: NotificationProvider,
    pub notification_ntfy_url: Option<String>,
    pub notification_ntfy_topic: Option<String>,
    pub notification_discord_webhook: Option<String>,
    pub notification_min_discount_percent: i32,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub notification_cooldown_minutes: i64,
    pub timezone: String,

    pub notify_deals: bool,
    pub notify_trip_matches: bool,
    pub notify_route_updates: bool,
    pub notify_system: bool,

    pub deal_notify_min_rating: i32,
    pub deal_notify_categories: Vec<String>,
    pub deal_notify_cabin_classes: Vec<String>,

    pub deal_cooldown_minutes: i64,
    pub trip_cooldown_hours: i64,
    pub route_cooldown_hours: i64,

    pub daily_digest_enabled: bool,
    pub daily_digest_hour: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationProvider {
    None,
    NtfySelfHosted,
    NtfySh,
    Discord,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            home_airports: vec!["AKL".to_string()],
            home_region: "Oceania".to_string(),
            watched_destinations: vec![
                "SYD".to_string(), "MEL".to_string(), "NAN".to_string(),
                "RAR".to_string(), "HNL".to_string(), "TYO".to_string(), "SIN".to_string(),
            ],
            watched_regions: vec!["Pacific".to_string(), "Asia".to_string(), "Australia".to_string()],
            preferred_currency: "NZD".to_string(),
            notifications_enabled: false,
            notification_provider: NotificationProvider::None,
            notification_ntfy_url: None,
            notification_ntfy_topic: None,
            notification_discord_webhook: None,
            notification_min_discount_percent: 20,
            quiet_hours_start: None,
            quiet_hours_end: None,
            notification_cooldown_minutes: 60,
            timezone: "Pacific/Auckland".to_string(),
            notify_deals: true,
            notify_trip_matches: true,
            notify_route_updates: true,
            notify_system: true,
            deal_notify_min_rating: 3,
            deal_notify_categories: vec!["local".to_string(), "regional".to_string()],
            deal_notify_cabin_classes: vec![
                "economy".to_string(), "premium_economy".to_string(),
                "business".to_string(), "first".to_string(),
            ],
            deal_cooldown_minutes: 60,
            trip_cooldown_hours: 6,
            route_cooldown_hours: 24,
            daily_digest_enabled: false,
            daily_digest_hour: 8,
        }
    }
}

impl UserSettings {
    pub fn home_airport(&self) -> &str {
        self.home_airports.first().map(String::as_str).unwrap_or("AKL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_seed_values() {
        let s = UserSettings::default();
        assert_eq!(s.home_airport(), "AKL");
        assert_eq!(s.watched_destinations.len(), 7);
        assert!(!s.notifications_enabled);
    }
}
