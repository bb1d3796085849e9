//! Politeness-aware HTTP fetcher.
//!
//! Every fetch runs under three constraints at once: the source's
//! allow/deny URL policy, robots.txt, and the source's token-bucket rate
//! limit. Ordinary failures never surface as `Err`; they are encoded in
//! [`FetchResult::error`] so batch runs continue past individual URLs.

use crate::observability::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::ingestion::rate_limiter::TokenBucket;
use crate::pipeline::ingestion::registry::SourceConfig;
use crate::pipeline::ingestion::robots::RobotsChecker;
use chrono::{DateTime, Utc};
use reqwest::header::USER_AGENT;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, warn};

/// Result of fetching a URL.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub content: Vec<u8>,
    pub content_hash: String,
    pub mime_type: String,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
    pub is_duplicate: bool,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    fn failed(url: &str, fetched_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            content: Vec::new(),
            content_hash: String::new(),
            mime_type: String::new(),
            status: 0,
            fetched_at,
            is_duplicate: false,
            error: Some(error.into()),
        }
    }
}

/// Web crawler with rate limiting and robots.txt compliance.
///
/// Cheap to clone; all mutable state lives behind one shared inner.
#[derive(Clone)]
pub struct Crawler {
    inner: Arc<CrawlerInner>,
}

struct CrawlerInner {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
    max_retries: u32,
    robots: Option<RobotsChecker>,
    rate_limiters: Mutex<HashMap<String, Arc<TokenBucket>>>,
    seen_hashes: std::sync::Mutex<HashSet<String>>,
}

impl Crawler {
    pub fn new(user_agent: impl Into<String>, timeout: Duration, max_retries: u32, respect_robots: bool) -> Self {
        let user_agent = user_agent.into();
        let robots = respect_robots.then(|| RobotsChecker::new(user_agent.clone()));
        Self {
            inner: Arc::new(CrawlerInner {
                client: reqwest::Client::new(),
                user_agent,
                timeout,
                max_retries,
                robots,
                rate_limiters: Mutex::new(HashMap::new()),
                seen_hashes: std::sync::Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Hex-encoded SHA-256 over raw content bytes.
    ///
    /// Deterministic; used for both in-process and storage-level dedup.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    async fn rate_limiter_for(&self, source: &SourceConfig) -> Arc<TokenBucket> {
        let mut limiters = self.inner.rate_limiters.lock().await;
        limiters
            .entry(source.name.clone())
            .or_insert_with(|| {
                let limit = source.rate_limit();
                Arc::new(TokenBucket::new(limit.requests_per_second, limit.burst_limit))
            })
            .clone()
    }

    /// Fetch a URL for a source.
    ///
    /// Policy rejection, robots disallow, timeouts, transport errors and
    /// non-2xx statuses all come back as a `FetchResult`, never a panic or
    /// `Err`.
    pub async fn fetch(&self, url: &str, source: &SourceConfig) -> FetchResult {
        let fetched_at = Utc::now();

        if !source.is_url_allowed(url) {
            return FetchResult::failed(
                url,
                fetched_at,
                format!("URL not allowed by source '{}' configuration", source.name),
            );
        }

        if let Some(robots) = &self.inner.robots {
            if !robots.is_allowed(url).await {
                return FetchResult::failed(url, fetched_at, "Disallowed by robots.txt");
            }
        }

        let limiter = self.rate_limiter_for(source).await;
        limiter.acquire().await;

        let mut last_error: Option<String> = None;
        for attempt in 0..self.inner.max_retries {
            let started = Instant::now();
            let response = self
                .inner
                .client
                .get(url)
                .header(USER_AGENT, &self.inner.user_agent)
                .timeout(self.inner.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let mime_type = resp
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.split(';').next())
                        .unwrap_or("")
                        .trim()
                        .to_string();

                    match resp.bytes().await {
                        Ok(bytes) => {
                            let content = bytes.to_vec();
                            let content_hash = Self::compute_hash(&content);

                            let is_duplicate = {
                                let mut seen = self.inner.seen_hashes.lock().unwrap();
                                // record unseen hashes, flag repeats
                                !seen.insert(content_hash.clone())
                            };
                            if is_duplicate {
                                emit_counter(MetricName::CrawlerDuplicateContent, 1);
                            }

                            emit_counter(MetricName::CrawlerFetchSuccess, 1);
                            emit_histogram(
                                MetricName::CrawlerFetchDuration,
                                started.elapsed().as_secs_f64(),
                            );
                            emit_histogram(MetricName::CrawlerPayloadBytes, content.len() as f64);

                            return FetchResult {
                                url: url.to_string(),
                                content,
                                content_hash,
                                mime_type,
                                status,
                                fetched_at,
                                is_duplicate,
                                error: None,
                            };
                        }
                        Err(e) => {
                            last_error = Some(e.to_string());
                            warn!(
                                "Failed to read body from {}: {} (attempt {}/{})",
                                url,
                                e,
                                attempt + 1,
                                self.inner.max_retries
                            );
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(format!("Timeout after {}s", self.inner.timeout.as_secs()));
                    warn!(
                        "Timeout fetching {} (attempt {}/{})",
                        url,
                        attempt + 1,
                        self.inner.max_retries
                    );
                }
                Err(e) if e.is_builder() => {
                    // Malformed request; retrying cannot help
                    error!("Non-retryable error fetching {}: {}", url, e);
                    last_error = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    warn!(
                        "Transport error fetching {}: {} (attempt {}/{})",
                        url,
                        e,
                        attempt + 1,
                        self.inner.max_retries
                    );
                }
            }

            if attempt + 1 < self.inner.max_retries {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }

        emit_counter(MetricName::CrawlerFetchError, 1);
        FetchResult::failed(url, fetched_at, last_error.unwrap_or_else(|| "Unknown error".to_string()))
    }

    /// Fetch multiple URLs with at most `concurrency` requests in flight.
    ///
    /// Results come back in input order. The concurrency bound is
    /// independent of the rate limiter, which separately paces requests.
    pub async fn fetch_batch(
        &self,
        urls: &[String],
        source: &SourceConfig,
        concurrency: usize,
    ) -> Vec<FetchResult> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            let crawler = self.clone();
            let source = source.clone();
            let url = url.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                (index, crawler.fetch(&url, &source).await)
            });
        }

        let mut results: Vec<Option<FetchResult>> = urls.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!("Fetch task panicked: {}", e),
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    FetchResult::failed(&urls[index], Utc::now(), "Fetch task aborted")
                })
            })
            .collect()
    }

    /// Forget all content hashes seen by this crawler instance.
    pub fn clear_seen_hashes(&self) {
        self.inner.seen_hashes.lock().unwrap().clear();
    }

    /// Pre-mark a content hash as seen, e.g. from a prior run's snapshots.
    pub fn mark_hash_seen(&self, content_hash: &str) {
        self.inner
            .seen_hashes
            .lock()
            .unwrap()
            .insert(content_hash.to_string());
    }

    /// Clear cached robots.txt decisions.
    pub async fn clear_robots_cache(&self) {
        if let Some(robots) = &self.inner.robots {
            robots.clear_cache().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::registry::SourceRegistry;
    use std::io::Write;

    fn denying_source() -> SourceConfig {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[[sources]]
name = "locked"
domain = "example.com"
adapter = "fixture"
allowlist = ["https://example\\.com/wines/.*"]
"#,
        )
        .unwrap();
        let registry = SourceRegistry::load(file.path()).unwrap();
        registry.get_source("locked").unwrap().clone()
    }

    #[test]
    fn test_compute_hash_is_deterministic() {
        let a = Crawler::compute_hash(b"chateau margaux 2015");
        let b = Crawler::compute_hash(b"chateau margaux 2015");
        let c = Crawler::compute_hash(b"chateau margaux 2016");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_fetch_rejects_disallowed_url_without_network() {
        let crawler = Crawler::new("CellarScraper/test", Duration::from_secs(5), 1, false);
        let source = denying_source();

        let result = crawler.fetch("https://example.com/admin", &source).await;
        assert!(!result.success());
        assert!(result.error.as_deref().unwrap().contains("not allowed"));
        assert_eq!(result.status, 0);
    }

    #[tokio::test]
    async fn test_fetch_batch_preserves_input_order() {
        let crawler = Crawler::new("CellarScraper/test", Duration::from_secs(5), 1, false);
        let source = denying_source();

        // All rejected by policy, so no network is touched
        let urls = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
            "https://example.com/c".to_string(),
        ];
        let results = crawler.fetch_batch(&urls, &source, 2).await;

        assert_eq!(results.len(), 3);
        for (url, result) in urls.iter().zip(&results) {
            assert_eq!(&result.url, url);
            assert!(!result.success());
        }
    }

    #[test]
    fn test_seen_hash_bookkeeping() {
        let crawler = Crawler::new("CellarScraper/test", Duration::from_secs(5), 1, false);
        crawler.mark_hash_seen("abc123");
        assert!(crawler.inner.seen_hashes.lock().unwrap().contains("abc123"));

        crawler.clear_seen_hashes();
        assert!(crawler.inner.seen_hashes.lock().unwrap().is_empty());
    }
}
