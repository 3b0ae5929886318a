//! Bridge status reporting on `<prefix>/@/status`.

use serde::{Deserialize, Serialize};

use ecosight_common::current_timestamp_millis;

use crate::Result;
use crate::publisher::AttributePublisher;

/// Lifecycle state reported by a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Running,
    Offline,
    Error,
}

/// Status document published by a bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    pub status: BridgeState,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    /// Bridge-specific fields, merged into the document.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BridgeStatus {
    pub fn new(bridge: impl Into<String>, version: impl Into<String>, status: BridgeState) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status,
            timestamp: current_timestamp_millis(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, BridgeState::Running)
    }

    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, BridgeState::Offline)
    }

    /// An error status carrying `error` as its message.
    pub fn error(
        bridge: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut status = Self::new(bridge, version, BridgeState::Error);
        status
            .metadata
            .insert("error".to_string(), serde_json::Value::String(error.into()));
        status
    }

    /// Merge the fields of a JSON object into the document.
    ///
    /// Non-object values are stored under `metadata`.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        match metadata {
            serde_json::Value::Object(fields) => self.metadata.extend(fields),
            serde_json::Value::Null => {}
            other => {
                self.metadata.insert("metadata".to_string(), other);
            }
        }
        self
    }

    pub async fn publish(&self, publisher: &AttributePublisher) -> Result<()> {
        publisher
            .publish_json(&publisher.keys().status(), self)
            .await
    }
}

/// Publishes the status document of one bridge.
pub struct StatusPublisher {
    publisher: AttributePublisher,
    bridge: String,
    version: String,
}

impl StatusPublisher {
    pub fn new(
        publisher: AttributePublisher,
        bridge: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge: bridge.into(),
            version: version.into(),
        }
    }

    pub async fn publish_running(&self, metadata: Option<serde_json::Value>) -> Result<()> {
        let status = BridgeStatus::running(&self.bridge, &self.version)
            .with_metadata(metadata.unwrap_or_default());
        status.publish(&self.publisher).await
    }

    pub async fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(&self.bridge, &self.version)
            .publish(&self.publisher)
            .await
    }

    pub async fn publish_error(&self, error: impl Into<String>) -> Result<()> {
        BridgeStatus::error(&self.bridge, &self.version, error)
            .publish(&self.publisher)
            .await
    }
}
