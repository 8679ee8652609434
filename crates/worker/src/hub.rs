//! Consumer hub: the worker's view of its attached consumers.
//!
//! The hosting runtime owns the actual consumer windows; the worker only
//! needs to broadcast messages, surface notifications, and focus or open a
//! window on notification activation. The trait keeps that surface small
//! enough to fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message pushed from the worker to all attached consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Activation completed; this version now serves requests.
    Ready { version: String },
    /// All partitions were cleared via the control channel.
    CacheCleared,
}

/// A user-facing notification surfaced from a push payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Target opened or focused when the notification is activated.
    pub url: String,
}

/// An open consumer window known to the hosting runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerWindow {
    pub id: String,
    pub url: String,
}

/// The hosting runtime's consumer surface.
#[async_trait]
pub trait ConsumerHub: Send + Sync {
    /// Push a message to every attached consumer. Fire-and-forget.
    async fn broadcast(&self, message: OutboundMessage);

    /// Currently open consumer windows.
    async fn windows(&self) -> Vec<ConsumerWindow>;

    /// Bring a window forward. Returns false if the window is gone.
    async fn focus(&self, id: &str) -> bool;

    /// Open a new window at a URL.
    async fn open_window(&self, url: &str);

    /// Surface a user notification.
    async fn show_notification(&self, notification: &Notification);
}

/// Hub for the standalone binary: outbound messages go to stdout as JSON
/// lines (the same channel control replies use); window management is
/// logged only, since no runtime is attached.
pub struct StdoutHub;

#[async_trait]
impl ConsumerHub for StdoutHub {
    async fn broadcast(&self, message: OutboundMessage) {
        match serde_json::to_string(&message) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to serialize outbound message: {e}"),
        }
    }

    async fn windows(&self) -> Vec<ConsumerWindow> {
        Vec::new()
    }

    async fn focus(&self, id: &str) -> bool {
        tracing::info!(id, "focus requested with no attached runtime");
        false
    }

    async fn open_window(&self, url: &str) {
        tracing::info!(url, "open-window requested with no attached runtime");
    }

    async fn show_notification(&self, notification: &Notification) {
        tracing::info!(title = %notification.title, body = %notification.body, "notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_wire_shape() {
        let json = serde_json::to_value(OutboundMessage::Ready { version: "v2".into() }).unwrap();
        assert_eq!(json["type"], "ready");
        assert_eq!(json["version"], "v2");

        let json = serde_json::to_value(OutboundMessage::CacheCleared).unwrap();
        assert_eq!(json["type"], "cache-cleared");
    }
}
