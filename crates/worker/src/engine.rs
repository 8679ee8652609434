//! The worker engine: one object owning the store, network, manifest and
//! lifecycle, serving every entry point (intercepted requests, control
//! commands, sync wake-ups, push payloads).
//!
//! Every intercepted retrieval request produces a response; mutating
//! methods are never intercepted and pass straight through to the network.

use std::sync::Arc;

use serde_json::json;

use offcache_client::Network;
use offcache_core::classify::classify;
use offcache_core::manifest::VersionManifest;
use offcache_core::resource::ResourceRequest;
use offcache_core::store::PartitionStore;
use offcache_core::AppConfig;

use crate::control::{Command, Reply};
use crate::hub::{ConsumerHub, OutboundMessage};
use crate::lifecycle::{InvalidTransition, LifecycleController, LifecycleState};
use crate::refresh::{notification_for_push, on_notification_click, refresh_external, RefreshReport};
use crate::strategy::{dispatch, ServedResponse, StrategyContext, StrategyMap};

/// What interception decided for one outbound request.
#[derive(Debug)]
pub enum FetchDecision {
    /// The worker answered; hand this response to the caller.
    Served(ServedResponse),
    /// Not intercepted; the caller goes straight to the network.
    Passthrough,
}

pub struct Engine {
    ctx: StrategyContext,
    hub: Arc<dyn ConsumerHub>,
    strategies: StrategyMap,
    lifecycle: LifecycleController,
    /// Last-known update flag, reported by check-version. Detection happens
    /// outside this layer.
    update_available: bool,
}

impl Engine {
    pub fn new(
        config: &AppConfig, store: PartitionStore, network: Arc<dyn Network>, hub: Arc<dyn ConsumerHub>,
    ) -> Self {
        let ctx = StrategyContext { store, network, manifest: Arc::new(config.manifest()) };
        let strategies = StrategyMap::with_overrides(&config.strategy_overrides);
        Self { ctx, hub, strategies, lifecycle: LifecycleController::new(), update_available: false }
    }

    pub fn manifest(&self) -> &VersionManifest {
        &self.ctx.manifest
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn set_update_available(&mut self, available: bool) {
        self.update_available = available;
    }

    /// Run install and, since install requests immediate activation,
    /// activate straight away.
    pub async fn startup(&mut self) -> Result<(), InvalidTransition> {
        self.lifecycle
            .install(&self.ctx.store, &self.ctx.network, &self.ctx.manifest)
            .await?;
        if self.lifecycle.skip_waiting() {
            self.lifecycle
                .activate(&self.ctx.store, &self.ctx.manifest, &self.hub)
                .await?;
        }
        Ok(())
    }

    /// Intercept one outbound resource request.
    pub async fn handle_request(&self, request: &ResourceRequest) -> FetchDecision {
        if !request.method.is_retrieval() {
            return FetchDecision::Passthrough;
        }

        let class = classify(request, &self.ctx.manifest.all_external_hosts());
        let kind = self.strategies.for_class(class);
        tracing::debug!(url = %request.url, ?class, ?kind, "dispatching");

        let outcome = dispatch(kind, request, &self.ctx).await;
        FetchDecision::Served(outcome.response)
    }

    /// Execute one control command and build its reply.
    pub async fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::ActivateNow => {
                match self
                    .lifecycle
                    .activate(&self.ctx.store, &self.ctx.manifest, &self.hub)
                    .await
                {
                    Ok(_) => Reply::ok(),
                    Err(e) => Reply::err(e.to_string()),
                }
            }
            Command::ClearAll => match self.ctx.store.clear_all().await {
                Ok(deleted) => {
                    self.hub.broadcast(OutboundMessage::CacheCleared).await;
                    Reply::with_data(json!({ "deleted": deleted }))
                }
                Err(e) => Reply::err(e.to_string()),
            },
            Command::ReportState => match self.ctx.store.states().await {
                Ok(states) => {
                    let mut info = serde_json::Map::new();
                    for state in states {
                        info.insert(state.name, json!({ "size": state.size, "urls": state.urls }));
                    }
                    Reply::with_data(serde_json::Value::Object(info))
                }
                Err(e) => Reply::err(e.to_string()),
            },
            Command::ForceUpdate => self.force_update().await,
            Command::CheckVersion => Reply::with_data(json!({
                "current_version": self.ctx.manifest.version,
                "update_available": self.update_available,
            })),
        }
    }

    /// Clear everything and run the full install/activate cycle again, as
    /// if a new version had arrived.
    async fn force_update(&mut self) -> Reply {
        if let Err(e) = self.ctx.store.clear_all().await {
            return Reply::err(e.to_string());
        }
        self.hub.broadcast(OutboundMessage::CacheCleared).await;

        if let Err(e) = self.lifecycle.restart() {
            return Reply::err(e.to_string());
        }

        let install = match self
            .lifecycle
            .install(&self.ctx.store, &self.ctx.network, &self.ctx.manifest)
            .await
        {
            Ok(report) => report,
            Err(e) => return Reply::err(e.to_string()),
        };

        match self
            .lifecycle
            .activate(&self.ctx.store, &self.ctx.manifest, &self.hub)
            .await
        {
            Ok(_) => Reply::with_data(json!({ "precached": install.precached, "failed": install.failed })),
            Err(e) => Reply::err(e.to_string()),
        }
    }

    /// Background sync wake-up: refresh the external partition.
    pub async fn handle_sync(&self) -> RefreshReport {
        refresh_external(&self.ctx.store, &self.ctx.network, &self.ctx.manifest).await
    }

    /// Push payload received: surface a notification.
    pub async fn handle_push(&self, payload: Option<&[u8]>) {
        let notification = notification_for_push(payload, &self.ctx.manifest);
        self.hub.show_notification(&notification).await;
    }

    /// Notification activated: focus or open the target consumer.
    pub async fn handle_notification_click(&self, target_url: &str) {
        on_notification_click(&self.hub, target_url).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{FakeNetwork, RecordingHub};
    use offcache_core::resource::Method;

    fn config() -> AppConfig {
        AppConfig {
            version: "v1".into(),
            origin: "https://app.example".into(),
            core_paths: vec!["/".into(), "/index.html".into()],
            external_urls: vec!["https://cdn.jsdelivr.net/npm/chart.js".into()],
            ..Default::default()
        }
    }

    async fn engine_with(network: FakeNetwork, hub: RecordingHub) -> Engine {
        let store = PartitionStore::open_in_memory().await.unwrap();
        Engine::new(&config(), store, Arc::new(network), Arc::new(hub))
    }

    fn respond_manifest(network: &FakeNetwork) {
        network.respond("https://app.example/", 200, b"shell");
        network.respond("https://app.example/index.html", 200, b"<html>shell</html>");
        network.respond("https://cdn.jsdelivr.net/npm/chart.js", 200, b"chart");
    }

    #[tokio::test]
    async fn test_startup_installs_and_activates() {
        let network = FakeNetwork::new();
        respond_manifest(&network);
        let hub = RecordingHub::new();
        let mut engine = engine_with(network, hub.clone()).await;

        engine.startup().await.unwrap();

        assert_eq!(engine.lifecycle_state(), LifecycleState::Active);
        assert_eq!(hub.broadcasts(), vec![OutboundMessage::Ready { version: "v1".into() }]);
    }

    #[tokio::test]
    async fn test_mutating_methods_pass_through() {
        let engine = engine_with(FakeNetwork::new(), RecordingHub::new()).await;
        let mut request = ResourceRequest::get("https://app.example/api/submit");
        request.method = Method::Post;

        assert!(matches!(engine.handle_request(&request).await, FetchDecision::Passthrough));
    }

    #[tokio::test]
    async fn test_retrieval_requests_are_always_answered() {
        // No cache, no network: still a response, not a crash.
        let network = FakeNetwork::new();
        network.set_down(true);
        let engine = engine_with(network, RecordingHub::new()).await;

        let request = ResourceRequest::get("https://app.example/photo.png");
        let FetchDecision::Served(response) = engine.handle_request(&request).await else {
            panic!("expected a served response");
        };
        assert_eq!(response.status, 503);
        assert_eq!(response.source, ResponseSource::Fallback);
    }

    #[tokio::test]
    async fn test_clear_all_is_idempotent_and_broadcasts() {
        let network = FakeNetwork::new();
        respond_manifest(&network);
        let hub = RecordingHub::new();
        let mut engine = engine_with(network, hub.clone()).await;
        engine.startup().await.unwrap();

        let first = engine.handle_command(Command::ClearAll).await;
        assert!(first.success);
        let second = engine.handle_command(Command::ClearAll).await;
        assert!(second.success);
        assert_eq!(second.data.unwrap()["deleted"], 0);

        assert!(hub.broadcasts().contains(&OutboundMessage::CacheCleared));
        assert!(engine.ctx.store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_state_lists_partitions() {
        let network = FakeNetwork::new();
        respond_manifest(&network);
        let mut engine = engine_with(network, RecordingHub::new()).await;
        engine.startup().await.unwrap();

        let reply = engine.handle_command(Command::ReportState).await;
        assert!(reply.success);
        let data = reply.data.unwrap();
        assert_eq!(data["static-v1"]["size"], 2);
        assert_eq!(data["external-v1"]["size"], 1);
        assert_eq!(data["dynamic-v1"]["size"], 0);
        assert!(
            data["static-v1"]["urls"]
                .as_array()
                .unwrap()
                .contains(&json!("https://app.example/index.html"))
        );
    }

    #[tokio::test]
    async fn test_check_version_reports_flag() {
        let mut engine = engine_with(FakeNetwork::new(), RecordingHub::new()).await;

        let reply = engine.handle_command(Command::CheckVersion).await;
        let data = reply.data.unwrap();
        assert_eq!(data["current_version"], "v1");
        assert_eq!(data["update_available"], false);

        engine.set_update_available(true);
        let reply = engine.handle_command(Command::CheckVersion).await;
        assert_eq!(reply.data.unwrap()["update_available"], true);
    }

    #[tokio::test]
    async fn test_activate_now_only_from_waiting() {
        let network = FakeNetwork::new();
        respond_manifest(&network);
        let mut engine = engine_with(network, RecordingHub::new()).await;

        // Still installing: rejected.
        let reply = engine.handle_command(Command::ActivateNow).await;
        assert!(!reply.success);

        engine.startup().await.unwrap();
        // Already active: rejected again.
        let reply = engine.handle_command(Command::ActivateNow).await;
        assert!(!reply.success);
    }

    #[tokio::test]
    async fn test_force_update_repopulates() {
        let network = FakeNetwork::new();
        respond_manifest(&network);
        let mut engine = engine_with(network, RecordingHub::new()).await;
        engine.startup().await.unwrap();

        let reply = engine.handle_command(Command::ForceUpdate).await;
        assert!(reply.success);
        assert_eq!(reply.data.unwrap()["precached"], 3);
        assert_eq!(engine.lifecycle_state(), LifecycleState::Active);

        let names = engine.ctx.store.list_names().await.unwrap();
        assert_eq!(names, vec!["dynamic-v1", "external-v1", "static-v1"]);
    }

    #[tokio::test]
    async fn test_push_surfaces_notification() {
        let hub = RecordingHub::new();
        let engine = engine_with(FakeNetwork::new(), hub.clone()).await;

        engine.handle_push(Some(br#"{"title":"Hi"}"#)).await;
        let notifications = hub.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Hi");
    }
}
