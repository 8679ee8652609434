//! Caching strategies and per-class dispatch.
//!
//! Each executor takes the intercepted request plus the shared context and
//! always produces a response; failures only propagate as far as the best
//! available fallback. Cache writes after a successful fetch are best-effort
//! and never abort the response path.

pub mod cache_first;
pub mod network_first;
pub mod stale_while_revalidate;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use offcache_client::{FetchedResponse, Network};
use offcache_core::manifest::VersionManifest;
use offcache_core::resource::{CachedEntry, ResourceRequest};
use offcache_core::store::PartitionStore;
use offcache_core::ResourceClass;

/// The three response-construction algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl StrategyKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "cache-first" => Some(StrategyKind::CacheFirst),
            "network-first" => Some(StrategyKind::NetworkFirst),
            "stale-while-revalidate" => Some(StrategyKind::StaleWhileRevalidate),
            _ => None,
        }
    }
}

/// Resource class to strategy mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMap {
    pub document: StrategyKind,
    pub image: StrategyKind,
    pub external_library: StrategyKind,
    pub other: StrategyKind,
}

impl Default for StrategyMap {
    fn default() -> Self {
        Self {
            document: StrategyKind::NetworkFirst,
            image: StrategyKind::CacheFirst,
            external_library: StrategyKind::CacheFirst,
            other: StrategyKind::NetworkFirst,
        }
    }
}

impl StrategyMap {
    /// Apply configured overrides on top of the defaults. Unknown keys or
    /// values were rejected at config validation; anything slipping through
    /// is logged and skipped.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (class, strategy) in overrides {
            let Some(kind) = StrategyKind::parse(strategy) else {
                tracing::warn!(class, strategy, "ignoring unknown strategy override");
                continue;
            };
            match class.as_str() {
                "document" => map.document = kind,
                "image" => map.image = kind,
                "external-library" => map.external_library = kind,
                "other" => map.other = kind,
                _ => tracing::warn!(class, "ignoring override for unknown resource class"),
            }
        }
        map
    }

    pub fn for_class(&self, class: ResourceClass) -> StrategyKind {
        match class {
            ResourceClass::Document => self.document,
            ResourceClass::Image => self.image,
            ResourceClass::ExternalLibrary => self.external_library,
            ResourceClass::Other => self.other,
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
}

/// The response handed back to the intercepted caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl ServedResponse {
    pub fn from_cache(entry: CachedEntry) -> Self {
        Self { status: entry.status, headers: entry.headers, body: entry.body, source: ResponseSource::Cache }
    }

    pub fn from_network(response: &FetchedResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.bytes.to_vec(),
            source: ResponseSource::Network,
        }
    }
}

/// What a strategy execution produced: the response, plus the partition it
/// wrote to synchronously, if any. Background revalidation writes are not
/// reported here; tests assert on eventual store state instead.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub response: ServedResponse,
    pub wrote_partition: Option<String>,
}

/// Shared collaborators every executor needs.
#[derive(Clone)]
pub struct StrategyContext {
    pub store: PartitionStore,
    pub network: Arc<dyn Network>,
    pub manifest: Arc<VersionManifest>,
}

impl StrategyContext {
    /// Partition a captured response for this request is written to.
    pub fn write_partition(&self, request: &ResourceRequest) -> String {
        self.manifest.partition_name(self.manifest.role_for(request))
    }

    /// Store a successful network response, best-effort. Returns the
    /// partition name on success; logs and swallows storage failures.
    pub async fn store_response(&self, request: &ResourceRequest, response: &FetchedResponse) -> Option<String> {
        let key = match offcache_core::RequestKey::for_request(request) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("not caching unkeyable request {}: {e}", request.url);
                return None;
            }
        };
        let partition = self.write_partition(request);
        let entry = CachedEntry::capture(key, response.status, response.headers.clone(), response.bytes.to_vec());
        match self.store.put(&partition, &entry).await {
            Ok(()) => {
                tracing::debug!("cached {} in {partition}", request.url);
                Some(partition)
            }
            Err(e) => {
                tracing::warn!("failed to cache {}: {e}", request.url);
                None
            }
        }
    }
}

/// Refresh a cache entry in the background after serving from cache.
///
/// Fire-and-forget: the task is spawned and never awaited by the response
/// path, and both fetch and storage failures are swallowed (the cached copy
/// keeps serving). Overlapping refreshes for the same key are not
/// deduplicated; concurrent requests may each trigger an independent fetch,
/// resolved by last-write-wins in the store.
pub(crate) fn spawn_revalidate(ctx: &StrategyContext, request: &ResourceRequest) {
    let ctx = ctx.clone();
    let request = request.clone();
    tokio::spawn(async move {
        match ctx.network.fetch(&request).await {
            Ok(response) if response.is_success() => {
                ctx.store_response(&request, &response).await;
            }
            Ok(response) => {
                tracing::debug!("background refresh of {} got status {}", request.url, response.status);
            }
            Err(e) => {
                tracing::debug!("background refresh of {} failed: {e}", request.url);
            }
        }
    });
}

/// Execute the strategy chosen for this request.
pub async fn dispatch(kind: StrategyKind, request: &ResourceRequest, ctx: &StrategyContext) -> StrategyOutcome {
    match kind {
        StrategyKind::CacheFirst => cache_first::execute(request, ctx).await,
        StrategyKind::NetworkFirst => network_first::execute(request, ctx).await,
        StrategyKind::StaleWhileRevalidate => stale_while_revalidate::execute(request, ctx).await,
    }
}
