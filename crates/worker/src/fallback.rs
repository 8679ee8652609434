//! Last-resort responses when neither cache nor network can serve.
//!
//! Document requests get the cached root document if present, otherwise a
//! minimal offline page. Everything else gets a machine-readable 503 body.
//! The caller always receives a response object, never an error.

use serde_json::json;

use offcache_core::manifest::VersionManifest;
use offcache_core::resource::Method;
use offcache_core::store::PartitionStore;
use offcache_core::{RequestKey, ResourceClass};

use crate::strategy::{ResponseSource, ServedResponse};

const OFFLINE_PAGE: &str = "<!DOCTYPE html><html><head><title>Offline</title></head>\
<body><h1>You are offline</h1><p>Please check your internet connection and try again.</p></body></html>";

/// Build the fallback response for a request of the given class.
pub async fn fallback_response(class: ResourceClass, store: &PartitionStore, manifest: &VersionManifest) -> ServedResponse {
    if class == ResourceClass::Document {
        if let Some(entry) = cached_root_document(store, manifest).await {
            tracing::debug!("serving cached root document as navigation fallback");
            return ServedResponse {
                status: entry.status,
                headers: entry.headers,
                body: entry.body,
                source: ResponseSource::Fallback,
            };
        }
        return offline_page();
    }

    unavailable_response()
}

async fn cached_root_document(store: &PartitionStore, manifest: &VersionManifest) -> Option<offcache_core::CachedEntry> {
    let key = RequestKey::new(Method::Get, &manifest.root_document_url()).ok()?;
    match store.find_first(&manifest.lookup_order(), &key).await {
        Ok(hit) => hit.map(|(_, entry)| entry),
        Err(e) => {
            tracing::warn!("root document lookup failed: {e}");
            None
        }
    }
}

/// Minimal synthesized offline page for document requests.
fn offline_page() -> ServedResponse {
    ServedResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "text/html".to_string())],
        body: OFFLINE_PAGE.as_bytes().to_vec(),
        source: ResponseSource::Fallback,
    }
}

/// Structured service-unavailable response for non-document requests.
fn unavailable_response() -> ServedResponse {
    let body = json!({
        "error": "Network error",
        "message": "You are offline and this resource is not cached.",
        "offline": true,
    });
    ServedResponse {
        status: 503,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
        source: ResponseSource::Fallback,
    }
}
