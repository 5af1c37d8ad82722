//! HTTP fetch pipeline for the caching strategies.
//!
//! Unlike a crawler, the agent must hand non-2xx responses back to the
//! strategies unchanged (network-first returns them to the caller, cache-first
//! routes them to the offline fallback), so `fetch` only errors on transport
//! failures and body-size violations, never on HTTP status.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

use offshore_core::store::CachedResponse;
use offshore_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offshore/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offshore/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Derive fetch settings from the loaded application configuration.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub body: Bytes,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Whether the response was served from the application's own origin,
    /// the equivalent of a "basic" response type. Cross-origin responses are
    /// never cached by the cache-first strategy.
    pub fn is_basic(&self, app_origin: &Url) -> bool {
        self.final_url.origin() == app_origin.origin()
    }

    /// Capture this response for the store.
    pub fn into_cached(self) -> CachedResponse {
        CachedResponse::new(self.status, self.content_type, self.headers, self.body.to_vec())
    }
}

/// Capability the strategies require from the network. `FetchClient` is the
/// production implementation; tests substitute a mock to observe or delay
/// fetches.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedResponse, Error>;
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// Any HTTP response, success or not, comes back `Ok`; only transport
    /// errors and oversized bodies are `Err`.
    async fn fetch(&self, url: &Url) -> Result<FetchedResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("network error: {}", e)))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::FetchFailed(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, body.len());

        Ok(FetchedResponse { url: url.clone(), final_url, status, content_type, body, headers, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(status: u16, url: &str, final_url: &str) -> FetchedResponse {
        FetchedResponse {
            url: Url::parse(url).unwrap(),
            final_url: Url::parse(final_url).unwrap(),
            status,
            content_type: Some("image/png".to_string()),
            body: Bytes::from_static(b"tile"),
            headers: Vec::new(),
            fetch_ms: 10,
        }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "offshore/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = AppConfig { user_agent: "charts/2.0".into(), max_bytes: 1024, timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from_app(&app);
        assert_eq!(config.user_agent, "charts/2.0");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_is_basic_same_origin() {
        let origin = Url::parse("https://app.test").unwrap();
        let response = make_response(200, "https://app.test/index.html", "https://app.test/index.html");
        assert!(response.is_basic(&origin));
    }

    #[test]
    fn test_is_basic_cross_origin() {
        let origin = Url::parse("https://app.test").unwrap();
        let response = make_response(200, "https://unpkg.com/leaflet.js", "https://unpkg.com/leaflet.js");
        assert!(!response.is_basic(&origin));
    }

    #[test]
    fn test_is_basic_redirected_away() {
        let origin = Url::parse("https://app.test").unwrap();
        let response = make_response(200, "https://app.test/index.html", "https://cdn.test/index.html");
        assert!(!response.is_basic(&origin));
    }

    #[test]
    fn test_into_cached_preserves_fields() {
        let response = make_response(200, "https://app.test/a", "https://app.test/a");
        let cached = response.into_cached();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.content_type, Some("image/png".to_string()));
        assert_eq!(cached.body, b"tile");
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let config = FetchConfig::default();
        let client = FetchClient::new(config);
        assert!(client.is_ok());
    }
}
