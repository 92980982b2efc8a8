use chrono::{DateTime, Utc};

/// Reason a scrape attempt failed to produce a usable result (§4.B.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Captcha,
    Timeout,
    LayoutChange,
    NoResults,
    Blocked,
    NetworkError,
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Captcha => "captcha",
            FailureReason::Timeout => "timeout",
            FailureReason::LayoutChange => "layout_change",
            FailureReason::NoResults => "no_results",
            FailureReason::Blocked => "blocked",
            FailureReason::NetworkError => "network_error",
            FailureReason::Unknown => "unknown",
        }
    }
}

/// 1:1 with SearchDefinition. Tracks success/failure counters, the circuit
/// breaker, and failure-artifact paths. Grounded directly on
/// `ScrapeHealth` (models/scrape_health.py) — the threshold constants (3 for
/// unhealthy, 5 for circuit-open) are load-bearing and preserved exactly.
#[derive(Debug, Clone)]
pub struct ScrapeHealth {
    pub id: i64,
    pub search_definition_id: i64,

    pub total_attempts: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_failures: u32,

    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,

    pub last_failure_reason: Option<FailureReason>,
    pub last_failure_message: Option<String>,
    pub last_screenshot_path: Option<String>,
    pub last_html_snapshot_path: Option<String>,

    pub stale_alert_sent_at: Option<DateTime<Utc>>,

    pub circuit_open: bool,
    pub circuit_opened_at: Option<DateTime<Utc>>,
}

impl ScrapeHealth {
    pub fn new(search_definition_id: i64) -> Self {
        Self {
            id: 0,
            search_definition_id,
            total_attempts: 0,
            total_successes: 0,
            total_failures: 0,
            consecutive_failures: 0,
            last_attempt_at: None,
            last_success_at: None,
            last_failure_at: None,
            last_failure_reason: None,
            last_failure_message: None,
            last_screenshot_path: None,
            last_html_snapshot_path: None,
            stale_alert_sent_at: None,
            circuit_open: false,
            circuit_opened_at: None,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        (self.total_successes as f64 / self.total_attempts as f64) * 100.0
    }

    /// Healthy iff the circuit is closed, fewer than 3 consecutive failures,
    /// and (not enough attempts yet, or success rate holds above 50%).
    pub fn is_healthy(&self) -> bool {
        if self.circuit_open {
            return false;
        }
        if self.consecutive_failures >= 3 {
            return false;
        }
        if self.total_attempts >= 10 && self.success_rate() < 50.0 {
            return false;
        }
        true
    }

    pub fn record_success(&mut self) {
        let now = Utc::now();
        self.total_attempts += 1;
        self.total_successes += 1;
        self.consecutive_failures = 0;
        self.last_attempt_at = Some(now);
        self.last_success_at = Some(now);

        if self.circuit_open {
            self.circuit_open = false;
            self.circuit_opened_at = None;
        }
    }

    pub fn record_failure(
        &mut self,
        reason: FailureReason,
        message: Option<String>,
        screenshot_path: Option<String>,
        html_snapshot_path: Option<String>,
    ) {
        let now = Utc::now();
        self.total_attempts += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_attempt_at = Some(now);
        self.last_failure_at = Some(now);
        self.last_failure_reason = Some(reason);
        self.last_failure_message = message;
        self.last_screenshot_path = screenshot_path;
        self.last_html_snapshot_path = html_snapshot_path;

        if self.consecutive_failures >= 5 && !self.circuit_open {
            self.circuit_open = true;
            self.circuit_opened_at = Some(now);
        }
    }

    /// §4.E staleness alert: due if the last success was more than 25 hours
    /// ago and no alert has gone out in the preceding 24 hours.
    pub fn stale_alert_due(&self, now: DateTime<Utc>) -> bool {
        let stale = match self.last_success_at {
            Some(t) => now - t > chrono::Duration::hours(25),
            None => true,
        };
        if !stale {
            return false;
        }
        match self.stale_alert_sent_at {
            Some(sent) => now - sent > chrono::Duration::hours(24),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_opens_at_five_consecutive_failures() {
        let mut h = ScrapeHealth::new(1);
        for _ in 0..4 {
            h.record_failure(FailureReason::Timeout, None, None, None);
            assert!(!h.circuit_open);
        }
        h.record_failure(FailureReason::Timeout, None, None, None);
        assert!(h.circuit_open);
        assert_eq!(h.consecutive_failures, 5);
    }

    #[test]
    fn success_closes_circuit_and_zeroes_streak() {
        let mut h = ScrapeHealth::new(1);
        for _ in 0..5 {
            h.record_failure(FailureReason::Blocked, None, None, None);
        }
        assert!(h.circuit_open);
        h.record_success();
        assert!(!h.circuit_open);
        assert_eq!(h.consecutive_failures, 0);
    }

    #[test]
    fn unhealthy_at_three_consecutive_but_circuit_still_closed() {
        let mut h = ScrapeHealth::new(1);
        for _ in 0..3 {
            h.record_failure(FailureReason::NoResults, None, None, None);
        }
        assert!(!h.circuit_open);
        assert!(!h.is_healthy());
    }

    #[test]
    fn unhealthy_below_fifty_percent_success_rate_with_enough_attempts() {
        let mut h = ScrapeHealth::new(1);
        for _ in 0..6 {
            h.record_failure(FailureReason::Unknown, None, None, None);
            h.record_success();
        }
        // 6 failures + 6 successes interleaved never crosses 5 consecutive,
        // but bumps attempts to 12 with a 50% rate: still considered healthy
        // at exactly the boundary (>= 50, not < 50).
        assert!(h.total_attempts >= 10);
        assert!(h.is_healthy());
    }
}
