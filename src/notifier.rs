//! Notifier (§4.K): gates a notification through toggle/quiet-hours/cooldown
//! checks before dispatching to one of four providers. Grounded on
//! `original_source/backend/app/services/notifier.py`'s gating-then-dispatch
//! shape; the ntfy/discord wire formats come from their respective public
//! HTTP APIs (ntfy's `Title`/`Priority`/`Tags`/`Actions` headers, Discord's
//! `{content, embeds}` webhook body).

use crate::models::{NotificationProvider, UserSettings};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Default,
    High,
    Urgent,
}

impl Priority {
    fn ntfy_value(&self) -> &'static str {
        match self {
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    fn discord_color(&self) -> u32 {
        match self {
            Priority::Default => 0x3498db,
            Priority::High => 0xe67e22,
            Priority::Urgent => 0xe74c3c,
        }
    }
}

/// Severity inputs drive priority selection (§4.K): an absolute new low or
/// `robust_z < -2.0` is urgent, `< -1.5` is high, otherwise default.
pub fn priority_for_deal(is_new_low: bool, robust_z: Option<f64>) -> Priority {
    if is_new_low || robust_z.map(|z| z < -2.0).unwrap_or(false) {
        Priority::Urgent
    } else if robust_z.map(|z| z < -1.5).unwrap_or(false) {
        Priority::High
    } else {
        Priority::Default
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Deal,
    TripMatch,
    RouteUpdate,
    System,
}

pub struct Notification {
    pub category: NotificationCategory,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    pub cta_url: Option<String>,
    /// Cooldown key, e.g. `"{origin}-{destination}"` for a deal alert.
    pub route_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateRejection {
    NotificationsDisabled,
    CategoryDisabled,
    QuietHours,
    Cooldown,
}

pub struct Notifier {
    http: Client,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self { http: Client::new(), last_sent: Mutex::new(HashMap::new()) }
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.K's gating decision step: evaluated before any HTTP POST is
    /// attempted, so a rejected alert never reaches the provider.
    pub fn gate(
        &self,
        notification: &Notification,
        settings: &UserSettings,
        now_utc: DateTime<Utc>,
    ) -> Result<(), GateRejection> {
        if !settings.notifications_enabled {
            return Err(GateRejection::NotificationsDisabled);
        }

        let category_enabled = match notification.category {
            NotificationCategory::Deal => settings.notify_deals,
            NotificationCategory::TripMatch => settings.notify_trip_matches,
            NotificationCategory::RouteUpdate => settings.notify_route_updates,
            NotificationCategory::System => settings.notify_system,
        };
        if !category_enabled {
            return Err(GateRejection::CategoryDisabled);
        }

        let bypasses_quiet_hours =
            notification.category == NotificationCategory::System && notification.priority == Priority::Urgent;
        if !bypasses_quiet_hours && in_quiet_hours(settings, now_utc) {
            return Err(GateRejection::QuietHours);
        }

        let cooldown_minutes = match notification.category {
            NotificationCategory::Deal => settings.deal_cooldown_minutes,
            NotificationCategory::TripMatch => settings.trip_cooldown_hours * 60,
            NotificationCategory::RouteUpdate => settings.route_cooldown_hours * 60,
            NotificationCategory::System => 0,
        };
        if cooldown_minutes > 0 {
            let last_sent = self.last_sent.lock().unwrap();
            if let Some(last) = last_sent.get(&notification.route_key) {
                if now_utc - *last < chrono::Duration::minutes(cooldown_minutes) {
                    return Err(GateRejection::Cooldown);
                }
            }
        }

        Ok(())
    }

    pub async fn send(&self, notification: &Notification, settings: &UserSettings, now_utc: DateTime<Utc>) -> bool {
        if let Err(rejection) = self.gate(notification, settings, now_utc) {
            warn!(?rejection, route = %notification.route_key, "notification gated");
            return false;
        }

        let dispatched = match settings.notification_provider {
            NotificationProvider::None => true,
            NotificationProvider::NtfySelfHosted | NotificationProvider::NtfySh => {
                self.send_ntfy(notification, settings).await
            }
            NotificationProvider::Discord => self.send_discord(notification, settings).await,
        };

        if dispatched {
            self.last_sent.lock().unwrap().insert(notification.route_key.clone(), now_utc);
        }
        dispatched
    }

    async fn send_ntfy(&self, notification: &Notification, settings: &UserSettings) -> bool {
        let Some(base_url) = settings.notification_ntfy_url.as_deref() else {
            warn!("ntfy selected but no URL configured");
            return false;
        };
        let topic = settings.notification_ntfy_topic.as_deref().unwrap_or("walkabout-deals");
        let url = format!("{}/{}", base_url.trim_end_matches('/'), topic);

        let mut request = self
            .http
            .post(&url)
            .header("Title", &notification.title)
            .header("Priority", notification.priority.ntfy_value())
            .header("Tags", "airplane")
            .body(notification.body.clone());

        if let Some(cta) = &notification.cta_url {
            request = request.header("Actions", format!("view, Open, {cta}"));
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "ntfy returned a non-success status");
                false
            }
            Err(err) => {
                warn!(%err, "ntfy request failed");
                false
            }
        }
    }

    async fn send_discord(&self, notification: &Notification, settings: &UserSettings) -> bool {
        let Some(webhook) = settings.notification_discord_webhook.as_deref() else {
            warn!("discord selected but no webhook configured");
            return false;
        };

        let mut embed = json!({
            "title": notification.title,
            "description": notification.body,
            "color": notification.priority.discord_color(),
        });
        if let Some(cta) = &notification.cta_url {
            embed["url"] = json!(cta);
        }
        let body = json!({ "content": "", "embeds": [embed] });

        match self.http.post(webhook).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "discord webhook returned a non-success status");
                false
            }
            Err(err) => {
                warn!(%err, "discord webhook request failed");
                false
            }
        }
    }
}

/// §4.K: quiet hours wrap across midnight (e.g. `[22, 6)` covers 22:00
/// through 05:59). Evaluated in the user's configured timezone.
fn in_quiet_hours(settings: &UserSettings, now_utc: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (settings.quiet_hours_start, settings.quiet_hours_end) else {
        return false;
    };
    let tz: Tz = Tz::from_str(&settings.timezone).unwrap_or(chrono_tz::UTC);
    let local_hour = now_utc.with_timezone(&tz).format("%H").to_string().parse::<u8>().unwrap_or(0);

    if start == end {
        return false;
    }
    if start < end {
        local_hour >= start && local_hour < end
    } else {
        local_hour >= start || local_hour < end
    }
}

/// Builds a deal notification's title/body/CTA (§4.K).
#[allow(clippy::too_many_arguments)]
pub fn build_deal_notification(
    origin: &str,
    destination: &str,
    price: f64,
    currency: &str,
    median: f64,
    percentile: f64,
    cta_url: String,
    is_new_low: bool,
    robust_z: Option<f64>,
) -> Notification {
    let savings_pct = if median > 0.0 { ((median - price) / median) * 100.0 } else { 0.0 };
    let title = format!("{origin} -> {destination}: {} {price:.0}", currency);
    let body = format!(
        "{savings_pct:.0}% below the {median:.0}-median, {percentile:.0}th percentile. Book: {cta_url}"
    );
    Notification {
        category: NotificationCategory::Deal,
        priority: priority_for_deal(is_new_low, robust_z),
        title,
        body,
        cta_url: Some(cta_url),
        route_key: format!("{origin}-{destination}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserSettings;

    fn settings() -> UserSettings {
        let mut s = UserSettings::default();
        s.notifications_enabled = true;
        s.notify_deals = true;
        s
    }

    #[test]
    fn priority_escalates_with_severity() {
        assert_eq!(priority_for_deal(true, None), Priority::Urgent);
        assert_eq!(priority_for_deal(false, Some(-2.5)), Priority::Urgent);
        assert_eq!(priority_for_deal(false, Some(-1.6)), Priority::High);
        assert_eq!(priority_for_deal(false, Some(-0.5)), Priority::Default);
    }

    #[test]
    fn quiet_hours_wrap_across_midnight() {
        let mut s = settings();
        s.quiet_hours_start = Some(22);
        s.quiet_hours_end = Some(6);
        s.timezone = "UTC".to_string();

        let late_night = Utc::now().date_naive().and_hms_opt(23, 0, 0).unwrap().and_utc();
        let midday = Utc::now().date_naive().and_hms_opt(12, 0, 0).unwrap().and_utc();
        assert!(in_quiet_hours(&s, late_night));
        assert!(!in_quiet_hours(&s, midday));
    }

    #[test]
    fn disabled_notifications_reject_before_category_check() {
        let notifier = Notifier::new();
        let mut s = settings();
        s.notifications_enabled = false;
        let notification = build_deal_notification("AKL", "NRT", 800.0, "NZD", 1000.0, 10.0, "https://x".into(), false, None);
        let result = notifier.gate(&notification, &s, Utc::now());
        assert_eq!(result, Err(GateRejection::NotificationsDisabled));
    }

    #[test]
    fn cooldown_rejects_repeated_alerts_for_the_same_route() {
        let notifier = Notifier::new();
        let s = settings();
        let mut s = s;
        s.deal_cooldown_minutes = 60;
        let notification = build_deal_notification("AKL", "NRT", 800.0, "NZD", 1000.0, 10.0, "https://x".into(), false, None);
        let now = Utc::now();
        notifier.last_sent.lock().unwrap().insert(notification.route_key.clone(), now);
        let result = notifier.gate(&notification, &s, now + chrono::Duration::minutes(5));
        assert_eq!(result, Err(GateRejection::Cooldown));
    }
}
