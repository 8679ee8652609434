//! Typed request and response shapes.
//!
//! The hosting runtime hands the worker loosely-shaped request objects;
//! everything past the interception boundary uses these explicit types.

use serde::{Deserialize, Serialize};

use crate::key::RequestKey;

/// HTTP method of an intercepted request.
///
/// Only retrieval methods are ever served from cache; mutating methods
/// bypass interception entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl Method {
    /// Whether this method may be answered from cache.
    pub fn is_retrieval(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    /// Parse an upper-case method name; unknown names map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }
}

/// Declared destination of a request, as reported by the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Other,
}

/// An intercepted resource request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub method: Method,

    /// Absolute URL as received; normalized on key derivation.
    pub url: String,

    /// Declared destination, if the runtime reported one.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Accept header value, if present.
    #[serde(default)]
    pub accept: Option<String>,

    /// Whether this request is a top-level navigation.
    #[serde(default)]
    pub navigation: bool,
}

impl ResourceRequest {
    /// A plain GET for a URL with no declared destination.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), destination: None, accept: None, navigation: false }
    }
}

/// A captured response stored in a partition.
///
/// Opaque to the store: status, headers and body are persisted as captured.
/// There is no per-entry freshness timestamp; staleness is tracked purely by
/// partition identity, so entries only leave via whole-partition replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// The key this entry was stored under.
    pub key: RequestKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC3339 timestamp of the write; informational only.
    pub stored_at: String,
}

impl CachedEntry {
    /// Capture a response body under a key, stamped now.
    pub fn capture(key: RequestKey, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { key, status, headers, body, stored_at: chrono::Utc::now().to_rfc3339() }
    }

    /// First header value matching `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
