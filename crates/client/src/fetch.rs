//! HTTP fetch pipeline.
//!
//! Transport-level failures (DNS, connect, TLS, timeout) surface as
//! `Error::NetworkUnavailable`. A non-success HTTP status is NOT an error:
//! the response is returned as-is and the caller decides what to do with it
//! (the network-first executor passes it through when no cached copy
//! exists).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};

use offcache_core::key::normalize;
use offcache_core::resource::{Method, ResourceRequest};
use offcache_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s). This is the platform transport's own
    /// timeout; the strategies add none of their own.
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The URL requested, normalized.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers, flattened to string pairs.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

impl FetchedResponse {
    /// Whether the status is in the success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network as seen by the strategy executors.
///
/// `fetch` serves an intercepted retrieval request; `fetch_bypass` re-fetches
/// a URL with cache-bypass semantics for background refresh.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, Error>;

    async fn fetch_bypass(&self, url: &str) -> Result<FetchedResponse, Error>;
}

/// HTTP fetch client backed by reqwest.
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
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn execute(&self, method: Method, url_str: &str, accept: Option<&str>, bypass: bool) -> Result<FetchedResponse, Error> {
        let start = Instant::now();
        let url = normalize(url_str)?;

        let mut request = match method {
            Method::Head => self.http.head(url.as_str()),
            _ => self.http.get(url.as_str()),
        };

        request = request.header(
            header::ACCEPT,
            accept.unwrap_or("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        if bypass {
            request = request.header(header::CACHE_CONTROL, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("network error: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::NetworkUnavailable(format!(
                "response of {} bytes exceeds limit of {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} {} in {}ms ({} bytes)", url, final_url, status, fetch_ms, bytes.len());

        Ok(FetchedResponse { url: url.into(), final_url, status, headers, bytes, fetch_ms })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, Error> {
        self.execute(request.method, &request.url, request.accept.as_deref(), false)
            .await
    }

    async fn fetch_bypass(&self, url: &str) -> Result<FetchedResponse, Error> {
        self.execute(Method::Get, url, None, true).await
    }
}
