//! Rate-limited, cached client for the paper metadata API.
//!
//! Every outbound call goes through one [`ApiClient`]: cache lookup first,
//! then the shared [`RateLimiter`], then the request with retries. Failures
//! never propagate; callers get `None` and carry on with less data.

use crate::cache::{fingerprint, ResponseCache};
use crate::config::ClientConfig;
use crate::error::{GapError, Result};
use crate::rate_limit::RateLimiter;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Request counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub network_calls: u64,
    pub cache_hits: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    network_calls: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

/// API client wrapping the rate limiter and the response cache.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
    limiter: RateLimiter,
    cache: Mutex<ResponseCache>,
    stats: AtomicStats,
}

impl ApiClient {
    /// Build a client. Fails only on an invalid base URL or HTTP client setup.
    pub fn new(config: ClientConfig, limiter: RateLimiter, cache: ResponseCache) -> Result<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| GapError::Config(format!("Invalid API base URL {}: {}", base, e)))?;

        let http = reqwest::Client::builder()
            .user_agent("gapscholar/0.1")
            .timeout(config.timeout)
            .build()
            .map_err(|e| GapError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            config,
            limiter,
            cache: Mutex::new(cache),
            stats: AtomicStats::default(),
        })
    }

    /// Build a client from configuration, loading the cache from its path.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let cache = ResponseCache::load(config.cache_path.clone(), config.cache_ttl);
        Self::new(config, RateLimiter::default(), cache)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            network_calls: self.stats.network_calls.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    /// Number of cached responses.
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Write the cache to disk. A failed write is logged and otherwise ignored.
    pub fn persist_cache(&self) -> bool {
        match self.lock_cache().save() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist response cache, continuing in memory");
                false
            }
        }
    }

    /// GET `endpoint` with query `params`.
    ///
    /// Returns `None` when the API has no usable answer after retries.
    pub async fn request(&self, endpoint: &str, params: &[(&str, String)]) -> Option<Value> {
        let key = fingerprint(endpoint, params);
        if let Some(hit) = self.cached(&key) {
            debug!(endpoint = endpoint, "Cache hit");
            return Some(hit);
        }

        let url = self.endpoint_url(endpoint)?;
        let payload = self
            .send_with_retry(endpoint, || self.authorize(self.http.get(url.clone()).query(params)))
            .await?;

        self.lock_cache().insert(key, payload.clone());
        Some(payload)
    }

    /// POST identifiers to a bulk endpoint in chunks of `batch_size`.
    ///
    /// The result is aligned with `ids`. Every item of a failed chunk is `None`.
    /// The cache is persisted after each chunk.
    pub async fn request_batch(
        &self,
        endpoint: &str,
        ids: &[String],
        params: &[(&str, String)],
    ) -> Vec<Option<Value>> {
        let chunk_size = self.config.batch_size.max(1);
        let total_batches = ids.len().div_ceil(chunk_size);
        let mut results = Vec::with_capacity(ids.len());

        for (batch_idx, chunk) in ids.chunks(chunk_size).enumerate() {
            let items = self.request_chunk(endpoint, chunk, params).await;
            let found = items.iter().filter(|i| i.is_some()).count();
            info!(
                batch = batch_idx + 1,
                total_batches = total_batches,
                papers = chunk.len(),
                found = found,
                "Batch completed"
            );
            results.extend(items);
            self.persist_cache();
        }

        results
    }

    async fn request_chunk(
        &self,
        endpoint: &str,
        chunk: &[String],
        params: &[(&str, String)],
    ) -> Vec<Option<Value>> {
        let mut keyed: Vec<(&str, String)> = params.to_vec();
        keyed.push(("ids", chunk.join(",")));
        let key = fingerprint(endpoint, &keyed);

        let payload = match self.cached(&key) {
            Some(hit) => Some(hit),
            None => match self.endpoint_url(endpoint) {
                Some(url) => {
                    let body = serde_json::json!({ "ids": chunk });
                    self.send_with_retry(endpoint, || {
                        self.authorize(self.http.post(url.clone()).query(params).json(&body))
                    })
                    .await
                    .and_then(|payload| self.validate_chunk(payload, chunk.len(), key))
                }
                None => None,
            },
        };

        match payload.as_ref().and_then(Value::as_array) {
            Some(items) => items
                .iter()
                .map(|item| (!item.is_null()).then(|| item.clone()))
                .collect(),
            None => vec![None; chunk.len()],
        }
    }

    /// Only well-formed chunk responses are cached.
    fn validate_chunk(&self, payload: Value, expected: usize, key: String) -> Option<Value> {
        match payload.as_array() {
            Some(items) if items.len() == expected => {
                self.lock_cache().insert(key, payload.clone());
                Some(payload)
            }
            _ => {
                warn!(expected = expected, "Batch response not aligned with request, dropping chunk");
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn send_with_retry<F>(&self, endpoint: &str, build: F) -> Option<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let last = attempt + 1 == max_attempts;
            self.limiter.acquire().await;

            match self.send_once(build(), attempt + 1).await {
                Ok(payload) => return Some(payload),
                Err(GapError::RateLimited(throttled_on)) => {
                    if last {
                        break;
                    }
                    let backoff = self
                        .config
                        .backoff_base
                        .checked_mul(2u32.saturating_pow(attempt))
                        .unwrap_or(Duration::MAX);
                    warn!(
                        endpoint = endpoint,
                        attempt = throttled_on,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) if e.is_transient() => {
                    if last {
                        break;
                    }
                    warn!(endpoint = endpoint, attempt = attempt + 1, error = %e, "Transport failure, retrying");
                    tokio::time::sleep(self.config.transport_retry_delay).await;
                }
                Err(e) => {
                    warn!(endpoint = endpoint, error = %e, "Request failed");
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        warn!(endpoint = endpoint, attempts = max_attempts, "Giving up after retries");
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn send_once(&self, request: RequestBuilder, attempt: u32) -> Result<Value> {
        self.stats.network_calls.fetch_add(1, Ordering::Relaxed);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GapError::RateLimited(attempt));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GapError::Api {
                code: status.as_u16(),
                message: error_text.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| GapError::Parse(format!("Failed to parse API response: {}", e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Option<Url> {
        match self.base_url.join(endpoint) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(endpoint = endpoint, error = %e, "Cannot build endpoint URL");
                None
            }
        }
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let hit = self.lock_cache().get(key).cloned();
        if hit.is_some() {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    pub(crate) fn test_config(base_url: String, cache_path: PathBuf) -> ClientConfig {
        ClientConfig {
            base_url,
            api_key: None,
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            backoff_base: Duration::ZERO,
            transport_retry_delay: Duration::ZERO,
            batch_size: 2,
            cache_path,
            cache_ttl: Duration::from_secs(3600),
        }
    }

    pub(crate) fn test_client(base_url: String, dir: &TempDir) -> Result<ApiClient> {
        let config = test_config(base_url, dir.path().join("cache.json"));
        let cache = ResponseCache::load(config.cache_path.clone(), config.cache_ttl);
        ApiClient::new(config, RateLimiter::unthrottled(), cache)
    }

    fn params() -> Vec<(&'static str, String)> {
        vec![("fields", "title".to_string())]
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() -> Result<()> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/X")
            .match_query(Matcher::UrlEncoded("fields".into(), "title".into()))
            .with_status(200)
            .with_body(r#"{"paperId":"X","title":"Cached"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;

        let first = client.request("paper/X", &params()).await;
        let second = client.request("paper/X", &params()).await;

        mock.assert_async().await;
        assert_eq!(first, Some(json!({"paperId": "X", "title": "Cached"})));
        assert_eq!(first, second);
        assert_eq!(client.stats().cache_hits, 1);
        assert_eq!(client.stats().network_calls, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_throttled_then_success() -> Result<()> {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("GET", "/paper/Y")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/paper/Y")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"title":"Y"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;

        let result = client.request("paper/Y", &params()).await;
        throttled.assert_async().await;
        ok.assert_async().await;
        assert_eq!(result, Some(json!({"title": "Y"})));
        assert_eq!(client.stats().failures, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_throttling_exhausts_attempts() -> Result<()> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/Z")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;

        assert!(client.request("paper/Z", &params()).await.is_none());
        mock.assert_async().await;
        assert_eq!(client.stats().failures, 1);
        assert_eq!(client.cache_len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_error_not_retried() -> Result<()> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("Paper not found")
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;

        assert!(client.request("paper/missing", &params()).await.is_none());
        mock.assert_async().await;
        assert_eq!(client.stats().network_calls, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_failure_retried_then_none() -> Result<()> {
        let dir = TempDir::new()?;
        // Nothing listens on port 9 locally
        let client = test_client("http://127.0.0.1:9/".to_string(), &dir)?;

        assert!(client.request("paper/X", &params()).await.is_none());
        let stats = client.stats();
        assert_eq!(stats.network_calls, 3);
        assert_eq!(stats.failures, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_chunks_and_alignment() -> Result<()> {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/paper/batch")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({"ids": ["DOI:a", "DOI:b"]})))
            .with_status(200)
            .with_body(r#"[{"title":"A"}, null]"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/paper/batch")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({"ids": ["DOI:c"]})))
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let ids = vec!["DOI:a".to_string(), "DOI:b".to_string(), "DOI:c".to_string()];

        let results = client.request_batch("paper/batch", &ids, &params()).await;
        first.assert_async().await;
        second.assert_async().await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Some(json!({"title": "A"})));
        assert!(results[1].is_none());
        assert!(results[2].is_none());

        // Cache persisted after each chunk
        let reloaded = ResponseCache::load(dir.path().join("cache.json"), Duration::from_secs(3600));
        assert_eq!(reloaded.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_misaligned_batch_yields_empty_chunk() -> Result<()> {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/paper/batch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"title":"only one"}]"#)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let ids = vec!["DOI:a".to_string(), "DOI:b".to_string()];

        let results = client.request_batch("paper/batch", &ids, &params()).await;
        assert_eq!(results, vec![None, None]);
        assert_eq!(client.cache_len(), 0);
        Ok(())
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let dir = std::env::temp_dir().join("gapscholar-test-cache.json");
        let config = test_config("not a url".to_string(), dir.clone());
        let cache = ResponseCache::in_memory(Duration::from_secs(60));
        assert!(matches!(
            ApiClient::new(config, RateLimiter::unthrottled(), cache),
            Err(GapError::Config(_))
        ));
    }
}
