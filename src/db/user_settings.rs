use super::Database;
use crate::models::{NotificationProvider, UserSettings};
use crate::Result;
use rusqlite::OptionalExtension;

impl NotificationProvider {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationProvider::None => "none",
            NotificationProvider::NtfySelfHosted => "ntfy_self_hosted",
            NotificationProvider::NtfySh => "ntfy_sh",
            NotificationProvider::Discord => "discord",
        }
    }

    fn parse(s: &str) -> NotificationProvider {
        match s {
            "ntfy_self_hosted" => NotificationProvider::NtfySelfHosted,
            "ntfy_sh" => NotificationProvider::NtfySh,
            "discord" => NotificationProvider::Discord,
            _ => NotificationProvider::None,
        }
    }
}

fn json_vec(v: &[String]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

fn parse_json_vec(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

impl Database {
    /// Loaded once at boot per §9's redesign — callers are expected to hold
    /// the returned value rather than re-query per access.
    pub fn load_user_settings(&self) -> Result<UserSettings> {
        let row = self.session(|conn| {
            conn.query_row(
                "SELECT home_airports_json, home_region, watched_destinations_json, watched_regions_json,
                        preferred_currency, notifications_enabled, notification_provider,
                        notification_ntfy_url, notification_ntfy_topic, notification_discord_webhook,
                        notification_min_discount_percent, quiet_hours_start, quiet_hours_end,
                        notification_cooldown_minutes, timezone, notify_deals, notify_trip_matches,
                        notify_route_updates, notify_system, deal_notify_min_rating,
                        deal_notify_categories_json, deal_notify_cabin_classes_json,
                        deal_cooldown_minutes, trip_cooldown_hours, route_cooldown_hours,
                        daily_digest_enabled, daily_digest_hour
                 FROM user_settings WHERE id = 1",
                [],
                |row| {
                    Ok(UserSettings {
                        home_airports: parse_json_vec(&row.get::<_, String>(0)?),
                        home_region: row.get(1)?,
                        watched_destinations: parse_json_vec(&row.get::<_, String>(2)?),
                        watched_regions: parse_json_vec(&row.get::<_, String>(3)?),
                        preferred_currency: row.get(4)?,
                        notifications_enabled: row.get(5)?,
                        notification_provider: NotificationProvider::parse(&row.get::<_, String>(6)?),
                        notification_ntfy_url: row.get(7)?,
                        notification_ntfy_topic: row.get(8)?,
                        notification_discord_webhook: row.get(9)?,
                        notification_min_discount_percent: row.get(10)?,
                        quiet_hours_start: row.get::<_, Option<i64>>(11)?.map(|v| v as u8),
                        quiet_hours_end: row.get::<_, Option<i64>>(12)?.map(|v| v as u8),
                        notification_cooldown_minutes: row.get(13)?,
                        timezone: row.get(14)?,
                        notify_deals: row.get(15)?,
                        notify_trip_matches: row.get(16)?,
                        notify_route_updates: row.get(17)?,
                        notify_system: row.get(18)?,
                        deal_notify_min_rating: row.get(19)?,
                        deal_notify_categories: parse_json_vec(&row.get::<_, String>(20)?),
                        deal_notify_cabin_classes: parse_json_vec(&row.get::<_, String>(21)?),
                        deal_cooldown_minutes: row.get(22)?,
                        trip_cooldown_hours: row.get(23)?,
                        route_cooldown_hours: row.get(24)?,
                        daily_digest_enabled: row.get(25)?,
                        daily_digest_hour: row.get::<_, i64>(26)? as u8,
                    })
                },
            )
            .optional()
        })?;

        Ok(row.unwrap_or_default())
    }

    /// Persists `settings` as the single row, creating it if this is the
    /// first write. Callers must re-load (or swap their held copy) after
    /// calling this — there is no cache invalidation to do it for them.
    pub fn save_user_settings(&self, settings: &UserSettings) -> Result<()> {
        self.session(|conn| {
            conn.execute(
                "INSERT INTO user_settings (
                    id, home_airports_json, home_region, watched_destinations_json, watched_regions_json,
                    preferred_currency, notifications_enabled, notification_provider,
                    notification_ntfy_url, notification_ntfy_topic, notification_discord_webhook,
                    notification_min_discount_percent, quiet_hours_start, quiet_hours_end,
                    notification_cooldown_minutes, timezone, notify_deals, notify_trip_matches,
                    notify_route_updates, notify_system, deal_notify_min_rating,
                    deal_notify_categories_json, deal_notify_cabin_classes_json,
                    deal_cooldown_minutes, trip_cooldown_hours, route_cooldown_hours,
                    daily_digest_enabled, daily_digest_hour
                ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                          ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)
                ON CONFLICT(id) DO UPDATE SET
                    home_airports_json = excluded.home_airports_json,
                    home_region = excluded.home_region,
                    watched_destinations_json = excluded.watched_destinations_json,
                    watched_regions_json = excluded.watched_regions_json,
                    preferred_currency = excluded.preferred_currency,
                    notifications_enabled = excluded.notifications_enabled,
                    notification_provider = excluded.notification_provider,
                    notification_ntfy_url = excluded.notification_ntfy_url,
                    notification_ntfy_topic = excluded.notification_ntfy_topic,
                    notification_discord_webhook = excluded.notification_discord_webhook,
                    notification_min_discount_percent = excluded.notification_min_discount_percent,
                    quiet_hours_start = excluded.quiet_hours_start,
                    quiet_hours_end = excluded.quiet_hours_end,
                    notification_cooldown_minutes = excluded.notification_cooldown_minutes,
                    timezone = excluded.timezone,
                    notify_deals = excluded.notify_deals,
                    notify_trip_matches = excluded.notify_trip_matches,
                    notify_route_updates = excluded.notify_route_updates,
                    notify_system = excluded.notify_system,
                    deal_notify_min_rating = excluded.deal_notify_min_rating,
                    deal_notify_categories_json = excluded.deal_notify_categories_json,
                    deal_notify_cabin_classes_json = excluded.deal_notify_cabin_classes_json,
                    deal_cooldown_minutes = excluded.deal_cooldown_minutes,
                    trip_cooldown_hours = excluded.trip_cooldown_hours,
                    route_cooldown_hours = excluded.route_cooldown_hours,
                    daily_digest_enabled = excluded.daily_digest_enabled,
                    daily_digest_hour = excluded.daily_digest_hour",
                rusqlite::params![
                    json_vec(&settings.home_airports),
                    settings.home_region,
                    json_vec(&settings.watched_destinations),
                    json_vec(&settings.watched_regions),
                    settings.preferred_currency,
                    settings.notifications_enabled,
                    settings.notification_provider.as_str(),
                    settings.notification_ntfy_url,
                    settings.notification_ntfy_topic,
                    settings.notification_discord_webhook,
                    settings.notification_min_discount_percent,
                    settings.quiet_hours_start.map(|v| v as i64),
                    settings.quiet_hours_end.map(|v| v as i64),
                    settings.notification_cooldown_minutes,
                    settings.timezone,
                    settings.notify_deals,
                    settings.notify_trip_matches,
                    settings.notify_route_updates,
                    settings.notify_system,
                    settings.deal_notify_min_rating,
                    json_vec(&settings.deal_notify_categories),
                    json_vec(&settings.deal_notify_cabin_classes),
                    settings.deal_cooldown_minutes,
                    settings.trip_cooldown_hours,
                    settings.route_cooldown_hours,
                    settings.daily_digest_enabled,
                    settings.daily_digest_hour as i64,
                ],
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_defaults() {
        let db = Database::open_in_memory().unwrap();
        let loaded = db.load_user_settings().unwrap();
        assert_eq!(loaded.home_airport(), "AKL");

        let mut edited = loaded.clone();
        edited.notifications_enabled = true;
        db.save_user_settings(&edited).unwrap();

        let reloaded = db.load_user_settings().unwrap();
        assert!(reloaded.notifications_enabled);
    }
}
