//! Control channel message types.
//!
//! The controlling application sends discrete named commands; each command
//! gets a reply on the channel it arrived on. No ordering is guaranteed
//! across concurrently issued commands.

use serde::{Deserialize, Serialize};

/// A command from the controlling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Force immediate transition out of Waiting.
    ActivateNow,
    /// Delete every partition regardless of version.
    ClearAll,
    /// Report per-partition entry count and key list. Read-only.
    ReportState,
    /// Clear all partitions, then force reactivation, as if a new version
    /// had arrived.
    ForceUpdate,
    /// Report the current version identifier and the last-known
    /// update-available flag.
    CheckVersion,
}

/// Reply to a control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Reply {
    pub fn ok() -> Self {
        Self { success: true, error: None, data: None }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self { success: true, error: None, data: Some(data) }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, error: Some(message.into()), data: None }
    }
}
