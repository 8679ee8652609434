//! Request-key normalization and storage hashing.
//!
//! A key is a `(method, absolute URL)` pair. Normalization steps:
//! 1. Trim leading/trailing whitespace
//! 2. Default scheme to https:// if missing
//! 3. Lowercase the host
//! 4. Remove fragment (#...)
//! 5. Keep query string intact (do not reorder)
//!
//! Two textually different requests that normalize to the same pair hit the
//! same cache slot.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::Error;
use crate::resource::{Method, ResourceRequest};

/// Normalized cache key for a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    method: Method,
    url: String,
}

impl RequestKey {
    /// Build a key from a method and URL string, normalizing the URL.
    pub fn new(method: Method, url: &str) -> Result<Self, Error> {
        let normalized = normalize(url)?;
        Ok(Self { method, url: normalized.into() })
    }

    /// Derive the key for an intercepted request.
    pub fn for_request(request: &ResourceRequest) -> Result<Self, Error> {
        Self::new(request.method, &request.url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stable hex digest used as the storage primary key within a partition.
    pub fn storage_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Normalize a URL string for consistent cache addressing.
pub fn normalize(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".to_string()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
