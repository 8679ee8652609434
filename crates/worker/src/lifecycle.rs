//! Lifecycle controller: install-time pre-caching and activation cleanup.
//!
//! States are explicit and transitions run through a table rather than
//! being inferred from handler side effects. Install pre-caches the
//! manifest's core paths and external URLs; per-item fetch failures are
//! logged and never abort installation (missing assets are fetched on first
//! demand). Activation retires every partition whose name is not declared
//! by the current manifest, then claims the attached consumers.
//!
//! An install may be abandoned mid-flight when a newer manifest supersedes
//! it; partially-populated partitions are cleaned up by the next
//! activation.

use std::sync::Arc;

use serde::Serialize;

use offcache_client::Network;
use offcache_core::manifest::{Role, VersionManifest};
use offcache_core::resource::ResourceRequest;
use offcache_core::store::PartitionStore;
use offcache_core::{CachedEntry, Error, RequestKey};

use crate::hub::{ConsumerHub, OutboundMessage};

/// Lifecycle phase of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
}

/// Legal transitions. `Active -> Installing` restarts the cycle when a
/// newer manifest supersedes the current one.
const TRANSITIONS: &[(LifecycleState, LifecycleState)] = &[
    (LifecycleState::Installing, LifecycleState::Waiting),
    (LifecycleState::Waiting, LifecycleState::Activating),
    (LifecycleState::Activating, LifecycleState::Active),
    (LifecycleState::Active, LifecycleState::Installing),
];

#[derive(Debug, thiserror::Error)]
#[error("invalid lifecycle transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Outcome of the install phase.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub precached: usize,
    pub failed: usize,
}

/// Outcome of the activation phase.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
}

/// Drives one version through Installing -> Waiting -> Activating -> Active.
#[derive(Debug)]
pub struct LifecycleController {
    state: LifecycleState,
    skip_waiting: bool,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    pub fn new() -> Self {
        Self { state: LifecycleState::Installing, skip_waiting: false }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the install phase requested immediate activation.
    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    fn advance(&mut self, to: LifecycleState) -> Result<(), InvalidTransition> {
        if !TRANSITIONS.contains(&(self.state, to)) {
            return Err(InvalidTransition { from: self.state, to });
        }
        tracing::info!(from = ?self.state, to = ?to, "lifecycle transition");
        self.state = to;
        Ok(())
    }

    /// Pre-cache the manifest's assets and move to Waiting.
    ///
    /// Requests immediate activation on completion, full or partial.
    pub async fn install(
        &mut self, store: &PartitionStore, network: &Arc<dyn Network>, manifest: &VersionManifest,
    ) -> Result<InstallReport, InvalidTransition> {
        if self.state != LifecycleState::Installing {
            return Err(InvalidTransition { from: self.state, to: LifecycleState::Waiting });
        }

        tracing::info!(version = %manifest.version, "installing");

        for name in manifest.expected_partitions() {
            if let Err(e) = store.open_partition(&name).await {
                tracing::warn!("failed to open partition {name}: {e}");
            }
        }

        let mut report = InstallReport { precached: 0, failed: 0 };

        let static_partition = manifest.partition_name(Role::Static);
        for path in &manifest.core_paths {
            let url = manifest.core_url(path);
            precache(store, network, &static_partition, &url, &mut report).await;
        }

        let external_partition = manifest.partition_name(Role::External);
        for url in &manifest.external_urls {
            precache(store, network, &external_partition, url, &mut report).await;
        }

        if report.failed > 0 {
            let err = Error::PartialFetchFailure { failed: report.failed, total: report.failed + report.precached };
            tracing::warn!("install completed with failures: {err}");
        } else {
            tracing::info!(precached = report.precached, "install completed");
        }

        self.advance(LifecycleState::Waiting)?;
        self.skip_waiting = true;
        Ok(report)
    }

    /// Retire stale partitions, claim consumers, and become Active.
    pub async fn activate(
        &mut self, store: &PartitionStore, manifest: &VersionManifest, hub: &Arc<dyn ConsumerHub>,
    ) -> Result<ActivationReport, InvalidTransition> {
        self.advance(LifecycleState::Activating)?;

        let expected = manifest.expected_partitions();
        let mut deleted = Vec::new();

        match store.list_names().await {
            Ok(names) => {
                for name in names {
                    if expected.contains(&name) {
                        continue;
                    }
                    match store.delete(&name).await {
                        Ok(true) => {
                            tracing::info!("deleted stale partition {name}");
                            deleted.push(name);
                        }
                        Ok(false) => {}
                        // Deletion failure never blocks activation.
                        Err(e) => tracing::warn!("failed to delete stale partition {name}: {e}"),
                    }
                }
            }
            Err(e) => tracing::warn!("failed to enumerate partitions during activation: {e}"),
        }

        hub.broadcast(OutboundMessage::Ready { version: manifest.version.clone() })
            .await;

        self.advance(LifecycleState::Active)?;
        tracing::info!(version = %manifest.version, "activated");

        Ok(ActivationReport { deleted })
    }

    /// Restart the cycle, as when a newer manifest supersedes this one.
    pub fn restart(&mut self) -> Result<(), InvalidTransition> {
        self.advance(LifecycleState::Installing)?;
        self.skip_waiting = false;
        Ok(())
    }
}

async fn precache(
    store: &PartitionStore, network: &Arc<dyn Network>, partition: &str, url: &str, report: &mut InstallReport,
) {
    let request = ResourceRequest::get(url);
    match network.fetch(&request).await {
        Ok(response) if response.is_success() => {
            let Ok(key) = RequestKey::for_request(&request) else {
                tracing::warn!("skipping unkeyable pre-cache URL {url}");
                report.failed += 1;
                return;
            };
            let entry = CachedEntry::capture(key, response.status, response.headers.clone(), response.bytes.to_vec());
            match store.put(partition, &entry).await {
                Ok(()) => report.precached += 1,
                Err(e) => {
                    tracing::warn!("failed to pre-cache {url}: {e}");
                    report.failed += 1;
                }
            }
        }
        Ok(response) => {
            tracing::warn!("pre-cache fetch of {url} returned status {}", response.status);
            report.failed += 1;
        }
        Err(e) => {
            tracing::warn!("pre-cache fetch of {url} failed: {e}");
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_manifest, FakeNetwork, RecordingHub};
    use offcache_core::resource::Method;

    fn respond_all(network: &FakeNetwork, manifest: &VersionManifest) {
        for path in &manifest.core_paths {
            network.respond(&manifest.core_url(path), 200, b"asset");
        }
        for url in &manifest.external_urls {
            network.respond(url, 200, b"library");
        }
    }

    #[tokio::test]
    async fn test_install_precaches_all_assets() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        let manifest = test_manifest();
        respond_all(&network, &manifest);
        let network: Arc<dyn Network> = Arc::new(network);

        let mut controller = LifecycleController::new();
        let report = controller.install(&store, &network, &manifest).await.unwrap();

        assert_eq!(report.precached, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(controller.state(), LifecycleState::Waiting);
        assert!(controller.skip_waiting());

        let key = RequestKey::new(Method::Get, "https://app.example/index.html").unwrap();
        assert!(store.get("static-v1", &key).await.unwrap().is_some());

        let key = RequestKey::new(Method::Get, "https://cdn.jsdelivr.net/npm/chart.js").unwrap();
        assert!(store.get("external-v1", &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_install_tolerates_partial_failure() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        let manifest = test_manifest();
        // Only the root document is reachable.
        network.respond("https://app.example/", 200, b"shell");
        let network: Arc<dyn Network> = Arc::new(network);

        let mut controller = LifecycleController::new();
        let report = controller.install(&store, &network, &manifest).await.unwrap();

        assert_eq!(report.precached, 1);
        assert_eq!(report.failed, 3);
        // Installation still completed.
        assert_eq!(controller.state(), LifecycleState::Waiting);
    }

    #[tokio::test]
    async fn test_activation_retires_stale_partitions() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let manifest = test_manifest();
        for name in ["static-v0", "dynamic-v0", "static-v1", "dynamic-v1", "external-v1"] {
            store.open_partition(name).await.unwrap();
        }

        let hub = RecordingHub::new();
        let hub_dyn: Arc<dyn ConsumerHub> = Arc::new(hub.clone());

        let mut controller = LifecycleController { state: LifecycleState::Waiting, skip_waiting: true };
        let report = controller.activate(&store, &manifest, &hub_dyn).await.unwrap();

        assert_eq!(report.deleted, vec!["dynamic-v0", "static-v0"]);
        assert_eq!(store.list_names().await.unwrap(), vec!["dynamic-v1", "external-v1", "static-v1"]);
        assert_eq!(controller.state(), LifecycleState::Active);
        assert_eq!(hub.broadcasts(), vec![OutboundMessage::Ready { version: "v1".into() }]);
    }

    #[tokio::test]
    async fn test_activate_from_installing_is_rejected() {
        let store = PartitionStore::open_in_memory().await.unwrap();
        let hub: Arc<dyn ConsumerHub> = Arc::new(RecordingHub::new());

        let mut controller = LifecycleController::new();
        let result = controller.activate(&store, &test_manifest(), &hub).await;
        assert!(result.is_err());
        assert_eq!(controller.state(), LifecycleState::Installing);
    }

    #[tokio::test]
    async fn test_restart_only_from_active() {
        let mut controller = LifecycleController { state: LifecycleState::Active, skip_waiting: true };
        controller.restart().unwrap();
        assert_eq!(controller.state(), LifecycleState::Installing);
        assert!(!controller.skip_waiting());

        let mut waiting = LifecycleController { state: LifecycleState::Waiting, skip_waiting: false };
        assert!(waiting.restart().is_err());
    }
}
