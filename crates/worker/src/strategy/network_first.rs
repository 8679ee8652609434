//! Network-first executor.
//!
//! Try the network; cache and return on success. On transport failure or a
//! non-success status, fall back to the cached copy, then to the shared
//! fallback chain. A non-success network response with no cached copy is
//! passed through to the caller as-is.

use offcache_core::classify::classify;
use offcache_core::resource::ResourceRequest;
use offcache_core::RequestKey;

use super::{ServedResponse, StrategyContext, StrategyOutcome};
use crate::fallback::fallback_response;

pub async fn execute(request: &ResourceRequest, ctx: &StrategyContext) -> StrategyOutcome {
    let class = classify(request, &ctx.manifest.all_external_hosts());

    match ctx.network.fetch(request).await {
        Ok(response) if response.is_success() => {
            let wrote_partition = ctx.store_response(request, &response).await;
            StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition }
        }
        Ok(response) => {
            if let Some(entry) = cached_copy(request, ctx).await {
                tracing::debug!("network returned {} for {}; serving cached copy", response.status, request.url);
                return StrategyOutcome { response: ServedResponse::from_cache(entry), wrote_partition: None };
            }
            StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition: None }
        }
        Err(e) => {
            tracing::debug!("network fetch of {} failed: {e}", request.url);
            if let Some(entry) = cached_copy(request, ctx).await {
                return StrategyOutcome { response: ServedResponse::from_cache(entry), wrote_partition: None };
            }
            let response = fallback_response(class, &ctx.store, &ctx.manifest).await;
            StrategyOutcome { response, wrote_partition: None }
        }
    }
}

async fn cached_copy(request: &ResourceRequest, ctx: &StrategyContext) -> Option<offcache_core::CachedEntry> {
    let key = RequestKey::for_request(request).ok()?;
    match ctx.store.find_first(&ctx.manifest.lookup_order(), &key).await {
        Ok(hit) => hit.map(|(_, entry)| entry),
        Err(e) => {
            tracing::warn!("cache lookup failed for {}: {e}", request.url);
            None
        }
    }
}
