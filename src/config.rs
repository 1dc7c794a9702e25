//! Run configuration for the API client and the detectors.
//!
//! Values default to the polite settings for the unauthenticated Semantic
//! Scholar pool and can be overridden from the environment or the CLI.

use chrono::Datelike;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Semantic Scholar Graph API base URL
pub const DEFAULT_API_BASE: &str = "https://api.semanticscholar.org/graph/v1/";

/// Cache file name placed in the home directory
const CACHE_FILE_NAME: &str = ".gapscholar_cache.json";

/// Default cache file path: `~/.gapscholar_cache.json`
pub fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(CACHE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CACHE_FILE_NAME))
}

/// Settings for the outbound API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL that endpoints are joined onto
    pub base_url: String,
    /// Optional API key sent as `x-api-key`
    pub api_key: Option<String>,
    /// Transport-level timeout per call
    pub timeout: Duration,
    /// Attempts per request before giving up (throttling or transport failure)
    pub max_attempts: u32,
    /// Backoff base; the n-th throttled retry waits `backoff_base * 2^n`
    pub backoff_base: Duration,
    /// Fixed wait between attempts after a transport failure
    pub transport_retry_delay: Duration,
    /// Maximum identifiers per bulk call
    pub batch_size: usize,
    /// Cache file location
    pub cache_path: PathBuf,
    /// Whole-cache expiry window
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
            transport_retry_delay: Duration::from_secs(5),
            batch_size: 100,
            cache_path: default_cache_path(),
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `SEMANTIC_SCHOLAR_API_KEY`, `GAPSCHOLAR_API_BASE`
    /// and `GAPSCHOLAR_CACHE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(key) = env_var("SEMANTIC_SCHOLAR_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(base) = env_var("GAPSCHOLAR_API_BASE") {
            config.base_url = base;
        }
        if let Some(path) = env_var("GAPSCHOLAR_CACHE") {
            config.cache_path = PathBuf::from(path);
        }

        debug!(
            base_url = %config.base_url,
            has_key = config.api_key.is_some(),
            cache = %config.cache_path.display(),
            "Client configuration resolved"
        );
        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parameters shaping one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Minimum external citation count for citation-network candidates
    pub min_citations: u64,
    /// Earliest publication year for author-network candidates
    pub year_from: i32,
    /// Results kept per detector (the hard cap still applies)
    pub limit: Option<usize>,
    /// Library papers that must cite a candidate before it counts
    pub min_connections: usize,
    /// Number of most frequent library authors to query
    pub top_authors: usize,
    /// Works requested per author search
    pub author_search_limit: usize,
    /// Extra spacing between per-author searches
    pub author_delay: Duration,
    /// Year used for recency scoring and the quality filter
    pub current_year: i32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        let current_year = chrono::Local::now().year();
        Self {
            min_citations: 50,
            year_from: current_year - 2,
            limit: None,
            min_connections: 2,
            top_authors: 10,
            author_search_limit: 20,
            author_delay: Duration::from_secs(2),
            current_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_path_file_name() {
        let path = default_cache_path();
        assert!(path.ends_with(CACHE_FILE_NAME));
    }

    #[test]
    fn test_default_options() {
        let options = AnalysisOptions::default();
        assert_eq!(options.year_from, options.current_year - 2);
        assert_eq!(options.min_connections, 2);
        assert_eq!(options.top_authors, 10);
        assert!(options.limit.is_none());
    }
}
