//! Prober module - per-URL liveness probing.
//!
//! A `Prober` drives one URL through a bounded retry state machine: fetch,
//! validate, classify, pace. It holds no mutable state of its own, so one
//! instance is shared by all workers while each worker owns its `Pacer`.

pub mod classifier;
pub mod fetch;
pub mod filter;
pub mod pacing;
pub mod rate_limiter;

use crate::error::ProbeError;
use crate::types::{KeywordSet, UrlRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use classifier::{classify, Classification};
pub use fetch::{Fetcher, HttpFetcher, PageResponse};
pub use filter::{FailureTracker, SkipReason, SkipRules};
pub use pacing::Pacer;
pub use rate_limiter::RateLimiter;

/// Label used for URLs that exhausted their attempts.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Label of candidates that were not probed.
pub const SKIPPED_LABEL: &str = "SKIPPED";

/// Challenge markers used when none are configured.
pub const DEFAULT_CHALLENGE_MARKERS: &[&str] = &["one moment"];

/// Configuration for probing.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per URL (values below 1 behave as 1).
    pub retries: u32,
    /// Pause after every attempt.
    pub delay: Duration,
    /// Soft-404 title keywords.
    pub keywords: KeywordSet,
    /// Lower-cased markers identifying WAF challenge pages.
    pub challenge_markers: Vec<String>,
    /// Ceiling for the escalated delay.
    pub max_backoff: Duration,
    /// Add uniform random jitter in `[0, delay)` to every pause.
    pub jitter: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            delay: Duration::from_secs(1),
            keywords: KeywordSet::default(),
            challenge_markers: DEFAULT_CHALLENGE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_backoff: Duration::from_secs(15),
            jitter: false,
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordSet) -> Self {
        self.keywords = keywords;
        self
    }

    /// Replace the challenge markers; they are trimmed and lower-cased.
    pub fn with_challenge_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.challenge_markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// A fresh pacer for one worker.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.delay, self.max_backoff, self.jitter)
    }

    fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

/// Outcome for a URL that received a structurally valid response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub url: String,
    pub classification: Classification,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// A URL that never produced a valid response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    pub url: String,
    pub attempts: u32,
    pub reason: String,
}

/// What probing one URL produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeReport {
    Resolved(ProbeResult),
    Exhausted(Unresolved),
}

impl ProbeReport {
    pub fn url(&self) -> &str {
        match self {
            Self::Resolved(r) => &r.url,
            Self::Exhausted(u) => &u.url,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Resolved(r) => r.attempts,
            Self::Exhausted(u) => u.attempts,
        }
    }

    /// Classification name, or `UNKNOWN` for exhausted URLs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved(r) => r.classification.as_str(),
            Self::Exhausted(_) => UNKNOWN_LABEL,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Resolved(r) if r.classification.is_alive())
    }
}

/// Probes URLs through a [`Fetcher`].
pub struct Prober<F> {
    fetcher: Arc<F>,
    config: ProbeConfig,
    limiter: Option<RateLimiter>,
}

impl<F: Fetcher> Prober<F> {
    pub fn new(fetcher: Arc<F>, config: ProbeConfig) -> Self {
        Self {
            fetcher,
            config,
            limiter: None,
        }
    }

    /// Draw a token from `limiter` before every request.
    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe one URL.
    pub async fn probe(&self, record: &UrlRecord, pacer: &mut Pacer) -> ProbeReport {
        self.probe_with_page(record, pacer).await.0
    }

    /// Probe one URL and also hand back the response that classified it.
    pub async fn probe_with_page(
        &self,
        record: &UrlRecord,
        pacer: &mut Pacer,
    ) -> (ProbeReport, Option<PageResponse>) {
        let max_attempts = self.config.attempts();
        let mut last_error: Option<ProbeError> = None;

        for attempt in 1..=max_attempts {
            if let Some(ref limiter) = self.limiter {
                limiter.wait().await;
            }

            let outcome = self.attempt(record).await;

            match outcome {
                Ok(page) => {
                    let classification =
                        classify(page.status, page.title.as_deref(), &self.config.keywords);
                    pacer.relax();
                    pacer.pause().await;

                    debug!(
                        url = record.as_str(),
                        attempt,
                        status = page.status,
                        %classification,
                        "probed"
                    );

                    let diagnostic = match classification {
                        Classification::SoftNotFound => page
                            .title
                            .as_deref()
                            .and_then(|t| self.config.keywords.first_match(t))
                            .map(|k| format!("title matched '{}'", k)),
                        _ => last_error
                            .as_ref()
                            .map(|e| format!("recovered after: {}", e)),
                    };

                    let result = ProbeResult {
                        url: record.as_str().to_string(),
                        classification,
                        attempts: attempt,
                        status: page.status,
                        title: page.title.clone(),
                        diagnostic,
                    };
                    return (ProbeReport::Resolved(result), Some(page));
                }
                Err(err) => {
                    if matches!(err, ProbeError::Challenge(_)) {
                        pacer.escalate();
                    }
                    debug!(
                        url = record.as_str(),
                        attempt,
                        max_attempts,
                        error = %err,
                        next_delay_ms = pacer.current().as_millis() as u64,
                        "attempt failed"
                    );
                    last_error = Some(err);
                    pacer.pause().await;
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        debug!(url = record.as_str(), attempts = max_attempts, %reason, "attempts exhausted");

        (
            ProbeReport::Exhausted(Unresolved {
                url: record.as_str().to_string(),
                attempts: max_attempts,
                reason,
            }),
            None,
        )
    }

    /// One request, bounded by the configured timeout and validated.
    async fn attempt(&self, record: &UrlRecord) -> Result<PageResponse, ProbeError> {
        let page = tokio::time::timeout(self.config.timeout, self.fetcher.fetch(record.url()))
            .await
            .map_err(|_| ProbeError::Timeout)??;

        if page.is_empty() {
            return Err(ProbeError::EmptyResponse);
        }

        if let Some(marker) = page.challenge_marker(&self.config.challenge_markers) {
            return Err(ProbeError::Challenge(marker.to_string()));
        }

        Ok(page)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher shared by unit tests.

    use super::*;
    use crate::error::FetchResult;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays queued responses per URL; an empty queue yields `fallback`.
    pub struct ScriptedFetcher {
        scripts: Mutex<HashMap<String, VecDeque<FetchResult<PageResponse>>>>,
        calls: Mutex<Vec<String>>,
        fallback: FetchResult<PageResponse>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                fallback: Err(ProbeError::Connect("no script".to_string())),
            }
        }

        pub fn script(self, url: &str, responses: Vec<FetchResult<PageResponse>>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(url.to_string(), responses.into());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url) -> FetchResult<PageResponse> {
            let key = url.to_string();
            self.calls.lock().unwrap().push(key.clone());
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    pub fn page(status: u16, title: &str) -> FetchResult<PageResponse> {
        Ok(PageResponse::new(status, "http://x/")
            .with_body(format!("<html><title>{}</title><body>content</body></html>", title)))
    }

    pub fn fast_config() -> ProbeConfig {
        ProbeConfig::new()
            .with_delay(Duration::ZERO)
            .with_timeout(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{fast_config, page, ScriptedFetcher};
    use super::*;

    fn record(url: &str) -> UrlRecord {
        UrlRecord::parse(url).unwrap()
    }

    #[tokio::test]
    async fn test_alive_on_first_attempt() {
        let fetcher = Arc::new(ScriptedFetcher::new().script("http://x/ok", vec![page(200, "Home")]));
        let prober = Prober::new(Arc::clone(&fetcher), fast_config());
        let mut pacer = prober.config().pacer();

        let report = prober.probe(&record("http://x/ok"), &mut pacer).await;
        assert!(report.is_alive());
        assert_eq!(report.attempts(), 1);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_real_404_stops_immediately() {
        let fetcher = Arc::new(
            ScriptedFetcher::new().script("http://x/gone", vec![page(404, "Home"), page(200, "Home")]),
        );
        let prober = Prober::new(Arc::clone(&fetcher), fast_config());
        let mut pacer = prober.config().pacer();

        let report = prober.probe(&record("http://x/gone"), &mut pacer).await;
        assert_eq!(report.label(), "REAL_NOT_FOUND");
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_soft_404_stops_with_diagnostic() {
        let fetcher = Arc::new(
            ScriptedFetcher::new().script("http://x/soft", vec![page(200, "Page Not Found")]),
        );
        let prober = Prober::new(Arc::clone(&fetcher), fast_config());
        let mut pacer = prober.config().pacer();

        match prober.probe(&record("http://x/soft"), &mut pacer).await {
            ProbeReport::Resolved(result) => {
                assert_eq!(result.classification, Classification::SoftNotFound);
                assert_eq!(result.diagnostic.as_deref(), Some("title matched 'not found'"));
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_recovers_on_last_attempt() {
        let fetcher = Arc::new(ScriptedFetcher::new().script(
            "http://x/flaky",
            vec![
                Err(ProbeError::Timeout),
                Ok(PageResponse::new(200, "http://x/flaky")),
                page(200, "Dashboard"),
            ],
        ));
        let prober = Prober::new(Arc::clone(&fetcher), fast_config().with_retries(3));
        let mut pacer = prober.config().pacer();

        match prober.probe(&record("http://x/flaky"), &mut pacer).await {
            ProbeReport::Resolved(result) => {
                assert_eq!(result.classification, Classification::Alive);
                assert_eq!(result.attempts, 3);
                assert_eq!(result.diagnostic.as_deref(), Some("recovered after: empty response"));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_attempts() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let prober = Prober::new(Arc::clone(&fetcher), fast_config().with_retries(3));
        let mut pacer = prober.config().pacer();

        let report = prober.probe(&record("http://x/down"), &mut pacer).await;
        assert_eq!(report.label(), UNKNOWN_LABEL);
        assert_eq!(report.attempts(), 3);
        assert_eq!(fetcher.calls().len(), 3);
        match report {
            ProbeReport::Exhausted(u) => assert!(u.reason.contains("no script")),
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let prober = Prober::new(Arc::clone(&fetcher), fast_config().with_retries(0));
        let mut pacer = prober.config().pacer();

        prober.probe(&record("http://x/down"), &mut pacer).await;
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_page_counts_as_failed_attempt() {
        let fetcher = Arc::new(ScriptedFetcher::new().script(
            "http://x/waf",
            vec![page(200, "One moment, please"), page(200, "Shop")],
        ));
        // A zero ceiling keeps the escalated pause at zero for the test.
        let config = fast_config().with_max_backoff(Duration::ZERO);
        let prober = Prober::new(Arc::clone(&fetcher), config);
        let mut pacer = prober.config().pacer();

        let report = prober.probe(&record("http://x/waf"), &mut pacer).await;
        assert!(report.is_alive());
        assert_eq!(report.attempts(), 2);
        assert_eq!(pacer.current(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_timeout_is_enforced_by_prober() {
        struct Hanging;

        #[async_trait::async_trait]
        impl Fetcher for Hanging {
            async fn fetch(&self, _url: &reqwest::Url) -> crate::error::FetchResult<PageResponse> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(PageResponse::new(200, "http://x/"))
            }
        }

        let config = fast_config()
            .with_timeout(Duration::from_millis(20))
            .with_retries(2);
        let prober = Prober::new(Arc::new(Hanging), config);
        let mut pacer = prober.config().pacer();

        match prober.probe(&record("http://x/slow"), &mut pacer).await {
            ProbeReport::Exhausted(u) => {
                assert_eq!(u.attempts, 2);
                assert_eq!(u.reason, "request timed out");
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }
}
