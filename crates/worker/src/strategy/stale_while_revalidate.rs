//! Stale-while-revalidate executor.
//!
//! On a hit, the cached entry is returned immediately and a background
//! fetch overwrites it on success; the response path never awaits the
//! refresh, so the stale response is always observable before the new write
//! lands. On a miss, the caller awaits the network directly.
//!
//! Concurrent requests for the same uncached key each trigger their own
//! network fetch; in-flight fetches are not deduplicated. Known
//! amplification risk under bursty concurrent misses, kept as designed.

use offcache_core::classify::classify;
use offcache_core::resource::ResourceRequest;
use offcache_core::RequestKey;

use super::{spawn_revalidate, ServedResponse, StrategyContext, StrategyOutcome};
use crate::fallback::fallback_response;

pub async fn execute(request: &ResourceRequest, ctx: &StrategyContext) -> StrategyOutcome {
    let class = classify(request, &ctx.manifest.all_external_hosts());

    let key = match RequestKey::for_request(request) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("unkeyable request {}: {e}", request.url);
            let response = fallback_response(class, &ctx.store, &ctx.manifest).await;
            return StrategyOutcome { response, wrote_partition: None };
        }
    };

    let cached = match ctx.store.find_first(&ctx.manifest.lookup_order(), &key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!("cache lookup failed for {}: {e}", request.url);
            None
        }
    };

    if let Some((partition, entry)) = cached {
        tracing::debug!("serving stale {} from {partition}, revalidating", request.url);
        spawn_revalidate(ctx, request);
        return StrategyOutcome { response: ServedResponse::from_cache(entry), wrote_partition: None };
    }

    match ctx.network.fetch(request).await {
        Ok(response) if response.is_success() => {
            let wrote_partition = ctx.store_response(request, &response).await;
            StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition }
        }
        Ok(response) => StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition: None },
        Err(e) => {
            tracing::debug!("network fetch of {} failed: {e}", request.url);
            let response = fallback_response(class, &ctx.store, &ctx.manifest).await;
            StrategyOutcome { response, wrote_partition: None }
        }
    }
}
