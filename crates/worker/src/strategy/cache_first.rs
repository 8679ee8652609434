//! Cache-first executor.
//!
//! Serve from cache when possible, refreshing the entry in the background.
//! On a miss, fetch from network; only when both cache and network come up
//! empty does the fallback chain run.

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

    match ctx.store.find_first(&ctx.manifest.lookup_order(), &key).await {
        Ok(Some((partition, entry))) => {
            tracing::debug!("cache hit for {} in {partition}", request.url);
            spawn_revalidate(ctx, request);
            StrategyOutcome { response: ServedResponse::from_cache(entry), wrote_partition: None }
        }
        Ok(None) => fetch_and_store(request, class, ctx).await,
        Err(e) => {
            // A failed read is treated as a miss; the network may still serve.
            tracing::warn!("cache lookup failed for {}: {e}", request.url);
            fetch_and_store(request, class, ctx).await
        }
    }
}

async fn fetch_and_store(
    request: &ResourceRequest, class: offcache_core::ResourceClass, ctx: &StrategyContext,
) -> StrategyOutcome {
    match ctx.network.fetch(request).await {
        Ok(response) if response.is_success() => {
            let wrote_partition = ctx.store_response(request, &response).await;
            StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition }
        }
        Ok(response) => {
            // A non-success status is still a response; pass it through
            // uncached rather than masking it with a synthesized fallback.
            StrategyOutcome { response: ServedResponse::from_network(&response), wrote_partition: None }
        }
        Err(e) => {
            tracing::debug!("network fetch of {} failed: {e}", request.url);
            let response = fallback_response(class, &ctx.store, &ctx.manifest).await;
            StrategyOutcome { response, wrote_partition: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{test_context, FakeNetwork};
    use offcache_core::resource::{CachedEntry, Method};

    #[tokio::test]
    async fn test_hit_returns_stored_bytes_and_refreshes_in_background() {
        let network = FakeNetwork::new();
        network.respond("https://app.example/logo.png", 200, b"fresh-bytes");
        let ctx = test_context(network.clone()).await;

        let key = RequestKey::new(Method::Get, "https://app.example/logo.png").unwrap();
        let entry = CachedEntry::capture(key.clone(), 200, Vec::new(), b"stale-bytes".to_vec());
        ctx.store.put("static-v1", &entry).await.unwrap();

        let request = ResourceRequest::get("https://app.example/logo.png");
        let outcome = execute(&request, &ctx).await;

        // Immediate response is byte-identical to the stored entry.
        assert_eq!(outcome.response.body, b"stale-bytes");
        assert_eq!(outcome.response.source, ResponseSource::Cache);
        assert!(outcome.wrote_partition.is_none());

        // The background refresh eventually overwrites the entry.
        for _ in 0..100 {
            let current = ctx.store.get("static-v1", &key).await.unwrap().unwrap();
            if current.body == b"fresh-bytes" {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("background refresh never landed");
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let network = FakeNetwork::new();
        network.respond("https://app.example/logo.png", 200, b"image-bytes");
        let ctx = test_context(network).await;

        let request = ResourceRequest::get("https://app.example/logo.png");
        let outcome = execute(&request, &ctx).await;

        assert_eq!(outcome.response.body, b"image-bytes");
        assert_eq!(outcome.response.source, ResponseSource::Network);
        assert_eq!(outcome.wrote_partition.as_deref(), Some("static-v1"));

        let key = RequestKey::for_request(&request).unwrap();
        let stored = ctx.store.get("static-v1", &key).await.unwrap().unwrap();
        assert_eq!(stored.body, b"image-bytes");
    }

    #[tokio::test]
    async fn test_miss_with_network_down_falls_back() {
        let network = FakeNetwork::new();
        network.set_down(true);
        let ctx = test_context(network).await;

        let request = ResourceRequest::get("https://app.example/logo.png");
        let outcome = execute(&request, &ctx).await;

        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.source, ResponseSource::Fallback);
    }

    #[tokio::test]
    async fn test_miss_with_error_status_passes_through() {
        let network = FakeNetwork::new();
        network.respond("https://app.example/gone.png", 404, b"not found");
        let ctx = test_context(network).await;

        let request = ResourceRequest::get("https://app.example/gone.png");
        let outcome = execute(&request, &ctx).await;

        assert_eq!(outcome.response.status, 404);
        assert!(outcome.wrote_partition.is_none());
    }
}
