//! Optional AI enrichment (§6 external interfaces): `AIService::complete`
//! wraps Anthropic's Messages API behind a process-wide cache keyed by a
//! content hash of `(prompt, system)`, so a given enrichment is only ever
//! requested once within the cache's TTL. Never consulted for pricing
//! decisions — the Price Fetcher and Price Analyzer run entirely without it.
//!
//! Grounded on `src/currency.rs`'s `RwLock`-guarded TTL cache shape; the
//! HTTP client idiom (plain `reqwest::Client`, fixed timeout) follows the
//! teacher's `client.rs::FlightClient::new`.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

struct CacheEntry {
    text: String,
    cached_at: DateTime<Utc>,
}

/// Optional AI enrichment collaborator. `None` for `api_key` makes every
/// call a silent no-op — the caller never needs to branch on whether AI is
/// configured before calling `complete`.
pub struct AIService {
    http: Client,
    api_key: Option<String>,
    model: String,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// Content hash of `(prompt, system)` used as the cache key. `md5` is
/// already a direct dependency (used by the scraping service's rolling-
/// horizon date sampler); reused here rather than adding a dedicated
/// hashing crate for a cache key that's never exposed outside this process.
fn cache_key(prompt: &str, system: &str) -> String {
    format!("{:x}", md5::compute(format!("{system}\u{0}{prompt}")))
}

impl AIService {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("reqwest client with no custom TLS config should always build"),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::hours(24),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns `None` when no key is configured, the request fails, or the
    /// response carries no text block — enrichment is always best-effort.
    pub async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> Option<String> {
        let key = cache_key(prompt, system);
        if let Some(entry) = self.cache.read().get(&key) {
            if Utc::now() - entry.cached_at < self.cache_ttl {
                return Some(entry.text.clone());
            }
        }

        let api_key = self.api_key.as_deref()?;
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: vec![Message { role: "user", content: prompt }],
        };

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let parsed: MessagesResponse = response.json().await.ok()?;
        let text = parsed.content.into_iter().next()?.text;

        self.cache.write().insert(key, CacheEntry { text: text.clone(), cached_at: Utc::now() });
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_service_never_calls_out() {
        let ai = AIService::new(None);
        assert!(!ai.is_configured());
        assert_eq!(ai.complete("hello", "system", 64).await, None);
    }

    #[test]
    fn cache_key_is_stable_for_the_same_inputs() {
        assert_eq!(cache_key("a", "b"), cache_key("a", "b"));
        assert_ne!(cache_key("a", "b"), cache_key("a", "c"));
    }
}
