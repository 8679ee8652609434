//! Test doubles shared by unit and integration tests.
//!
//! `FakeNetwork` scripts responses per URL and counts fetches; a global
//! "down" switch simulates the network being unavailable. `RecordingHub`
//! records every consumer-facing action for later assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use offcache_client::{FetchedResponse, Network};
use offcache_core::key::normalize;
use offcache_core::manifest::VersionManifest;
use offcache_core::resource::ResourceRequest;
use offcache_core::store::PartitionStore;
use offcache_core::Error;

use crate::hub::{ConsumerHub, ConsumerWindow, Notification, OutboundMessage};
use crate::strategy::StrategyContext;

/// Scripted in-memory network.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    inner: Arc<FakeNetworkInner>,
}

#[derive(Default)]
struct FakeNetworkInner {
    responses: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    down: AtomicBool,
    counts: Mutex<HashMap<String, usize>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response returned for a URL.
    pub fn respond(&self, url: &str, status: u16, body: &[u8]) {
        let key = normalize(url).expect("scripted URL must be valid").to_string();
        self.inner
            .responses
            .lock()
            .unwrap()
            .insert(key, (status, body.to_vec()));
    }

    /// Make every fetch fail with `NetworkUnavailable`.
    pub fn set_down(&self, down: bool) {
        self.inner.down.store(down, Ordering::SeqCst);
    }

    /// How many fetches (including bypass fetches) hit this URL.
    pub fn fetch_count(&self, url: &str) -> usize {
        let key = normalize(url).expect("URL must be valid").to_string();
        self.inner.counts.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn serve(&self, url: &str) -> Result<FetchedResponse, Error> {
        let key = normalize(url)?.to_string();
        *self.inner.counts.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        if self.inner.down.load(Ordering::SeqCst) {
            return Err(Error::NetworkUnavailable("network is down".to_string()));
        }

        let responses = self.inner.responses.lock().unwrap();
        let Some((status, body)) = responses.get(&key) else {
            return Err(Error::NetworkUnavailable(format!("no scripted response for {key}")));
        };

        Ok(FetchedResponse {
            url: key.clone(),
            final_url: key,
            status: *status,
            headers: Vec::new(),
            bytes: Bytes::from(body.clone()),
            fetch_ms: 0,
        })
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, Error> {
        self.serve(&request.url)
    }

    async fn fetch_bypass(&self, url: &str) -> Result<FetchedResponse, Error> {
        self.serve(url)
    }
}

/// Hub that records everything it is asked to do.
#[derive(Clone, Default)]
pub struct RecordingHub {
    inner: Arc<RecordingHubInner>,
}

#[derive(Default)]
struct RecordingHubInner {
    windows: Mutex<Vec<ConsumerWindow>>,
    broadcasts: Mutex<Vec<OutboundMessage>>,
    notifications: Mutex<Vec<Notification>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a consumer window is open at this URL.
    pub fn add_window(&self, id: &str, url: &str) {
        self.inner
            .windows
            .lock()
            .unwrap()
            .push(ConsumerWindow { id: id.to_string(), url: url.to_string() });
    }

    pub fn broadcasts(&self) -> Vec<OutboundMessage> {
        self.inner.broadcasts.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.notifications.lock().unwrap().clone()
    }

    pub fn focused(&self) -> Vec<String> {
        self.inner.focused.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.inner.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsumerHub for RecordingHub {
    async fn broadcast(&self, message: OutboundMessage) {
        self.inner.broadcasts.lock().unwrap().push(message);
    }

    async fn windows(&self) -> Vec<ConsumerWindow> {
        self.inner.windows.lock().unwrap().clone()
    }

    async fn focus(&self, id: &str) -> bool {
        let exists = self.inner.windows.lock().unwrap().iter().any(|w| w.id == id);
        if exists {
            self.inner.focused.lock().unwrap().push(id.to_string());
        }
        exists
    }

    async fn open_window(&self, url: &str) {
        self.inner.opened.lock().unwrap().push(url.to_string());
    }

    async fn show_notification(&self, notification: &Notification) {
        self.inner.notifications.lock().unwrap().push(notification.clone());
    }
}

/// Manifest used across tests: `app.example` origin, one external library
/// URL plus one allowlisted host.
pub fn test_manifest() -> VersionManifest {
    VersionManifest {
        version: "v1".to_string(),
        origin: "https://app.example".to_string(),
        core_paths: vec!["/".to_string(), "/index.html".to_string(), "/manifest.json".to_string()],
        external_urls: vec!["https://cdn.jsdelivr.net/npm/chart.js".to_string()],
        external_hosts: vec!["cdnjs.cloudflare.com".to_string()],
        root_document: "/index.html".to_string(),
    }
}

/// Strategy context over an in-memory store and the given fake network.
pub async fn test_context(network: FakeNetwork) -> StrategyContext {
    StrategyContext {
        store: PartitionStore::open_in_memory().await.expect("in-memory store"),
        network: Arc::new(network),
        manifest: Arc::new(test_manifest()),
    }
}
