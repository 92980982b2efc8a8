//! Headless-browser adapter (§4.B.4, the fallback source): drives a fresh
//! WebDriver session per scrape via `thirtyfour`, grounded on
//! `mratsim-delulu/delulu-apps/travel-agent`'s WebDriver usage
//! (`tests/t_hotels_thirtyfour.rs`), and delegates extraction to
//! [`crate::extractor`].
//!
//! Per §5, browser reuse across scrapes is prohibited — every call to
//! [`BrowserSource::fetch`] launches its own session and tears it down in a
//! scoped-release guard whose `Drop` runs the teardown even during a panic.
//! This crate's build profile must not set `panic = "abort"`, or `Drop`
//! would be skipped during unwinding and this guarantee would break.

use super::{FetchOutcome, NormalizedPrice, SourceError, SourceResult};
use crate::extractor::{self, ScrapeOutcome};
use crate::url_builder::{build_google_flights_url, FlightUrlParams};
use std::time::Duration;
use thirtyfour::{DesiredCapabilities, WebDriver};

/// CSS selectors that indicate a captcha challenge page.
const CAPTCHA_SELECTORS: &[&str] = &["#captcha-form", "div.g-recaptcha", "iframe[src*='recaptcha']"];
/// Substrings in page text that indicate a block page (distinct from a
/// captcha — e.g. an outright 403/rate-limit page).
const BLOCKED_TEXT_PATTERNS: &[&str] = &["unusual traffic", "automated queries", "access denied"];
/// Ranked selectors for "a price is visible" — the first that matches wins.
const PRICE_READY_SELECTORS: &[&str] = &["div[jsname=\"IWWDBc\"]", "div[jsname=\"YdtKid\"]", "span.gOatQ"];
const NO_RESULTS_TEXT: &str = "no results found";

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Chromium launch flags disabling automation-controlled signaling plus the
/// sandboxing adjustments needed to run one-shot browsers inside a
/// container.
const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--window-size=1366,768",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrapeStatus {
    Success,
    Captcha,
    Timeout,
    LayoutChange,
    NoResults,
    Blocked,
    NetworkError,
    #[default]
    Unknown,
}

impl ScrapeStatus {
    pub fn as_failure_reason(&self) -> Option<crate::models::FailureReason> {
        use crate::models::FailureReason as FR;
        match self {
            ScrapeStatus::Success => None,
            ScrapeStatus::Captcha => Some(FR::Captcha),
            ScrapeStatus::Timeout => Some(FR::Timeout),
            ScrapeStatus::LayoutChange => Some(FR::LayoutChange),
            ScrapeStatus::NoResults => Some(FR::NoResults),
            ScrapeStatus::Blocked => Some(FR::Blocked),
            ScrapeStatus::NetworkError => Some(FR::NetworkError),
            ScrapeStatus::Unknown => Some(FR::Unknown),
        }
    }
}

/// Owns a live WebDriver session for exactly one scrape. `Drop` always
/// issues `quit()` — on the happy path via [`BrowserSession::close`], on any
/// other exit (early return, panic) via a detached best-effort task spawned
/// from `Drop` itself, since `Drop::drop` cannot `.await`.
struct BrowserSession {
    driver: Option<WebDriver>,
}

impl BrowserSession {
    async fn launch(webdriver_url: &str) -> Result<Self, SourceError> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in CHROME_ARGS {
            caps.add_arg(arg).map_err(|e| SourceError::Transient { source: "browser", message: e.to_string() })?;
        }
        let driver = WebDriver::new(webdriver_url, caps)
            .await
            .map_err(|e| SourceError::Transient { source: "browser", message: e.to_string() })?;
        Ok(Self { driver: Some(driver) })
    }

    fn driver(&self) -> &WebDriver {
        self.driver.as_ref().expect("driver only taken in close()/drop()")
    }

    /// Normal-path teardown. Swallows the quit error — a failed teardown
    /// must never mask the scrape's actual outcome (§5 artifact-write
    /// policy applies equally here).
    async fn close(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(err) = driver.quit().await {
                tracing::warn!(%err, "browser session teardown failed");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            tokio::spawn(async move {
                let _ = driver.quit().await;
            });
        }
    }
}

pub struct BrowserSource {
    webdriver_url: Option<String>,
    artifact_dir: std::path::PathBuf,
}

impl BrowserSource {
    pub fn new(webdriver_url: Option<String>, artifact_dir: std::path::PathBuf) -> Self {
        Self { webdriver_url, artifact_dir }
    }

    /// Writes the HTML snapshot (always) and screenshot (when captured) for a
    /// classified failure, returning the paths actually written so they can
    /// be attached to the error that reaches the Health Tracker.
    async fn write_artifacts(
        &self,
        search_def_id: i64,
        reason: &str,
        html: &str,
        screenshot: Option<&[u8]>,
    ) -> (Option<String>, Option<String>) {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let stem = format!("{search_def_id}_{timestamp}_{reason}");

        let html_path = self.artifact_dir.join(format!("{stem}.html"));
        let html_written = match tokio::fs::write(&html_path, html).await {
            Ok(()) => Some(html_path.display().to_string()),
            Err(err) => {
                tracing::debug!(%err, path = %html_path.display(), "artifact write failed (best-effort)");
                None
            }
        };

        let screenshot_written = match screenshot {
            Some(bytes) => {
                let png_path = self.artifact_dir.join(format!("{stem}.png"));
                match tokio::fs::write(&png_path, bytes).await {
                    Ok(()) => Some(png_path.display().to_string()),
                    Err(err) => {
                        tracing::debug!(%err, path = %png_path.display(), "artifact write failed (best-effort)");
                        None
                    }
                }
            }
            None => None,
        };

        (html_written, screenshot_written)
    }

    async fn scrape(&self, search_def_id: i64, url: &str) -> BrowserScrapeResult {
        let Some(webdriver_url) = &self.webdriver_url else {
            return BrowserScrapeResult::status_only(ScrapeStatus::Unknown);
        };

        let session = match BrowserSession::launch(webdriver_url).await {
            Ok(s) => s,
            Err(_) => return BrowserScrapeResult::status_only(ScrapeStatus::NetworkError),
        };

        let nav_result =
            tokio::time::timeout(NAVIGATION_TIMEOUT, session.driver().goto(url)).await;
        let Ok(Ok(())) = nav_result else {
            let status = if nav_result.is_err() { ScrapeStatus::Timeout } else { ScrapeStatus::NetworkError };
            session.close().await;
            return BrowserScrapeResult::status_only(status);
        };

        // Give the SPA a moment to render before inspecting the DOM.
        tokio::time::sleep(Duration::from_secs(3)).await;

        let html = session.driver().source().await.unwrap_or_default();
        let html_lower = html.to_lowercase();

        let is_captcha = CAPTCHA_SELECTORS.iter().any(|sel| html.contains(sel));
        let is_blocked = BLOCKED_TEXT_PATTERNS.iter().any(|p| html_lower.contains(p));

        if is_captcha {
            let screenshot = session.driver().screenshot_as_png().await.ok();
            let (html_path, screenshot_path) =
                self.write_artifacts(search_def_id, "captcha", &html, screenshot.as_deref()).await;
            session.close().await;
            return BrowserScrapeResult {
                status: ScrapeStatus::Captcha,
                outcome: None,
                html_snapshot_path: html_path,
                screenshot_path,
            };
        }
        if is_blocked {
            let screenshot = session.driver().screenshot_as_png().await.ok();
            let (html_path, screenshot_path) =
                self.write_artifacts(search_def_id, "blocked", &html, screenshot.as_deref()).await;
            session.close().await;
            return BrowserScrapeResult {
                status: ScrapeStatus::Blocked,
                outcome: None,
                html_snapshot_path: html_path,
                screenshot_path,
            };
        }

        let has_price_marker = PRICE_READY_SELECTORS.iter().any(|sel| html.contains(sel));
        if !has_price_marker {
            if html_lower.contains(NO_RESULTS_TEXT) {
                session.close().await;
                return BrowserScrapeResult::status_only(ScrapeStatus::NoResults);
            }
            let screenshot = session.driver().screenshot_as_png().await.ok();
            let (html_path, screenshot_path) =
                self.write_artifacts(search_def_id, "layout_change", &html, screenshot.as_deref()).await;
            session.close().await;
            return BrowserScrapeResult {
                status: ScrapeStatus::LayoutChange,
                outcome: None,
                html_snapshot_path: html_path,
                screenshot_path,
            };
        }

        let outcome = extractor::extract(&html);
        session.close().await;

        if outcome.flights.is_empty() {
            BrowserScrapeResult { status: ScrapeStatus::LayoutChange, outcome: Some(outcome), ..Default::default() }
        } else {
            BrowserScrapeResult { status: ScrapeStatus::Success, outcome: Some(outcome), ..Default::default() }
        }
    }
}

#[derive(Default)]
struct BrowserScrapeResult {
    status: ScrapeStatus,
    outcome: Option<ScrapeOutcome>,
    html_snapshot_path: Option<String>,
    screenshot_path: Option<String>,
}

impl BrowserScrapeResult {
    fn status_only(status: ScrapeStatus) -> Self {
        Self { status, ..Default::default() }
    }
}

#[async_trait::async_trait]
impl super::PriceSource for BrowserSource {
    fn tag(&self) -> &'static str {
        "browser"
    }

    fn is_available(&self) -> bool {
        self.webdriver_url.is_some()
    }

    fn max_retries(&self) -> u32 {
        // A scrape is expensive; don't hammer a struggling browser.
        1
    }

    async fn fetch(&self, search_definition_id: i64, params: &FlightUrlParams<'_>) -> SourceResult {
        if self.webdriver_url.is_none() {
            return Err(SourceError::NotConfigured { source: "browser" });
        }
        let url = build_google_flights_url(params);
        let result = self.scrape(search_definition_id, &url).await;

        match result.status {
            ScrapeStatus::Success => {
                let outcome = result.outcome.expect("Success implies Some");
                let prices = outcome
                    .flights
                    .into_iter()
                    .map(|f| NormalizedPrice {
                        amount: f.price,
                        currency: params.currency.to_string(),
                        airline: f.airline,
                        stops: f.stops,
                        duration_minutes: f.duration_minutes,
                        booking_url: Some(url.clone()),
                        source_tag: "browser",
                        confidence: f.overall_confidence,
                    })
                    .collect();
                Ok(FetchOutcome { prices, source_tag: "browser", price_insights: None })
            }
            ScrapeStatus::NoResults => Ok(FetchOutcome { prices: vec![], source_tag: "browser", price_insights: None }),
            status => Err(SourceError::Classified {
                source: "browser",
                reason: status.as_failure_reason().unwrap_or(crate::models::FailureReason::Unknown),
                message: format!("{status:?}"),
                screenshot_path: result.screenshot_path,
                html_snapshot_path: result.html_snapshot_path,
            }),
        }
    }
}
