//! Background refresh and push handling.
//!
//! A sync wake-up re-fetches every external URL with cache-bypass semantics
//! and overwrites the external partition entry on success; each URL fails
//! independently. Push payloads are parsed leniently: parsed fields overlay
//! the defaults, an unparseable non-empty payload becomes the body, and no
//! payload at all leaves the defaults intact.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use offcache_client::Network;
use offcache_core::manifest::{Role, VersionManifest};
use offcache_core::resource::Method;
use offcache_core::store::PartitionStore;
use offcache_core::{CachedEntry, Error, RequestKey};

use crate::hub::{ConsumerHub, Notification};

const DEFAULT_TITLE: &str = "Update available";
const DEFAULT_BODY: &str = "New content is ready.";
const DEFAULT_ICON: &str = "/icons/icon-192.png";

/// Outcome of one external-refresh batch.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Re-fetch every external URL, bypassing intermediary caches, and
/// overwrite the external partition entry on success. Per-URL failures are
/// logged and never abort the batch.
pub async fn refresh_external(
    store: &PartitionStore, network: &Arc<dyn Network>, manifest: &VersionManifest,
) -> RefreshReport {
    let partition = manifest.partition_name(Role::External);
    let mut report = RefreshReport { refreshed: 0, failed: 0 };

    for url in &manifest.external_urls {
        match network.fetch_bypass(url).await {
            Ok(response) if response.is_success() => {
                let Ok(key) = RequestKey::new(Method::Get, url) else {
                    tracing::warn!("skipping unkeyable external URL {url}");
                    report.failed += 1;
                    continue;
                };
                let entry =
                    CachedEntry::capture(key, response.status, response.headers.clone(), response.bytes.to_vec());
                match store.put(&partition, &entry).await {
                    Ok(()) => {
                        tracing::debug!("refreshed {url}");
                        report.refreshed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("failed to store refreshed {url}: {e}");
                        report.failed += 1;
                    }
                }
            }
            Ok(response) => {
                tracing::warn!("refresh of {url} returned status {}", response.status);
                report.failed += 1;
            }
            Err(e) => {
                tracing::warn!("refresh of {url} failed: {e}");
                report.failed += 1;
            }
        }
    }

    if report.failed > 0 {
        let err = Error::PartialFetchFailure { failed: report.failed, total: report.failed + report.refreshed };
        tracing::warn!("external refresh completed with failures: {err}");
    }

    report
}

/// Optional structured push payload.
#[derive(Debug, Clone, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    url: Option<String>,
}

/// Build the notification for a push payload, falling back to defaults for
/// anything absent or unparseable.
pub fn notification_for_push(payload: Option<&[u8]>, manifest: &VersionManifest) -> Notification {
    let mut notification = Notification {
        title: DEFAULT_TITLE.to_string(),
        body: DEFAULT_BODY.to_string(),
        icon: DEFAULT_ICON.to_string(),
        url: manifest.origin.clone(),
    };

    let Some(bytes) = payload else {
        return notification;
    };

    match serde_json::from_slice::<PushPayload>(bytes) {
        Ok(parsed) => {
            if let Some(title) = parsed.title {
                notification.title = title;
            }
            if let Some(body) = parsed.body {
                notification.body = body;
            }
            if let Some(icon) = parsed.icon {
                notification.icon = icon;
            }
            if let Some(url) = parsed.url {
                notification.url = url;
            }
        }
        Err(_) => {
            // Not JSON: a non-empty text payload becomes the body.
            if let Ok(text) = std::str::from_utf8(bytes)
                && !text.trim().is_empty()
            {
                notification.body = text.to_string();
            }
        }
    }

    notification
}

/// Handle a notification activation: focus an already-open consumer whose
/// URL matches the target, or open a new one.
pub async fn on_notification_click(hub: &Arc<dyn ConsumerHub>, target_url: &str) {
    for window in hub.windows().await {
        if window.url == target_url && hub.focus(&window.id).await {
            tracing::debug!("focused existing window {} at {target_url}", window.id);
            return;
        }
    }
    hub.open_window(target_url).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_manifest, FakeNetwork, RecordingHub};

    #[tokio::test]
    async fn test_refresh_overwrites_external_entry() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let manifest = test_manifest();
        let network = FakeNetwork::new();
        network.respond("https://cdn.jsdelivr.net/npm/chart.js", 200, b"chart-new");

        let key = RequestKey::new(Method::Get, "https://cdn.jsdelivr.net/npm/chart.js").unwrap();
        let stale = CachedEntry::capture(key.clone(), 200, Vec::new(), b"chart-old".to_vec());
        store.put("external-v1", &stale).await.unwrap();

        let network: Arc<dyn Network> = Arc::new(network);
        let report = refresh_external(&store, &network, &manifest).await;

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 0);
        let entry = store.get("external-v1", &key).await.unwrap().unwrap();
        assert_eq!(entry.body, b"chart-new");
    }

    #[tokio::test]
    async fn test_refresh_failures_are_independent() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let mut manifest = test_manifest();
        manifest
            .external_urls
            .push("https://cdnjs.cloudflare.com/ajax/libs/jszip/jszip.min.js".to_string());

        let network = FakeNetwork::new();
        // Only the second URL is reachable.
        network.respond("https://cdnjs.cloudflare.com/ajax/libs/jszip/jszip.min.js", 200, b"jszip");

        let network: Arc<dyn Network> = Arc::new(network);
        let report = refresh_external(&store, &network, &manifest).await;

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_push_defaults_without_payload() {
        let n = notification_for_push(None, &test_manifest());
        assert_eq!(n.title, DEFAULT_TITLE);
        assert_eq!(n.body, DEFAULT_BODY);
        assert_eq!(n.url, "https://app.example");
    }

    #[test]
    fn test_push_json_overlays_defaults() {
        let payload = br#"{"title":"Report ready","url":"https://app.example/reports/7"}"#;
        let n = notification_for_push(Some(payload), &test_manifest());
        assert_eq!(n.title, "Report ready");
        assert_eq!(n.body, DEFAULT_BODY);
        assert_eq!(n.url, "https://app.example/reports/7");
    }

    #[test]
    fn test_push_plain_text_becomes_body() {
        let n = notification_for_push(Some(b"maintenance tonight"), &test_manifest());
        assert_eq!(n.body, "maintenance tonight");
        assert_eq!(n.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_click_focuses_matching_window() {
        let hub = RecordingHub::new();
        hub.add_window("w1", "https://app.example/reports/7");
        let hub_dyn: Arc<dyn ConsumerHub> = Arc::new(hub.clone());

        on_notification_click(&hub_dyn, "https://app.example/reports/7").await;

        assert_eq!(hub.focused(), vec!["w1"]);
        assert!(hub.opened().is_empty());
    }

    #[tokio::test]
    async fn test_click_opens_when_no_window_matches() {
        let hub = RecordingHub::new();
        hub.add_window("w1", "https://app.example/other");
        let hub_dyn: Arc<dyn ConsumerHub> = Arc::new(hub.clone());

        on_notification_click(&hub_dyn, "https://app.example/reports/7").await;

        assert!(hub.focused().is_empty());
        assert_eq!(hub.opened(), vec!["https://app.example/reports/7"]);
    }
}
