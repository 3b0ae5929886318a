//! Liveliness tokens for presence detection.
//!
//! # Key Expressions
//!
//! - Bridge liveliness: `<prefix>/@/alive`
//! - Device liveliness: `<prefix>/@/devices/<serial>/alive`
//!
//! A device token exists exactly while the device is reported online.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use zenoh::Session;
use zenoh::liveliness::LivelinessToken;

use ecosight_common::KeyExprBuilder;

use crate::error::{BridgeError, Result};

/// Manages liveliness tokens for a bridge and its devices.
///
/// The bridge token is declared on creation and undeclared on drop.
#[derive(Debug)]
pub struct LivelinessManager {
    session: Arc<Session>,
    keys: KeyExprBuilder,
    #[allow(dead_code)]
    bridge_token: LivelinessToken,
    device_tokens: RwLock<HashMap<String, LivelinessToken>>,
}

impl LivelinessManager {
    /// Create a new liveliness manager and declare the bridge as alive.
    pub async fn new(session: Arc<Session>, keys: KeyExprBuilder) -> Result<Self> {
        let bridge_key = keys.bridge_alive();

        let bridge_token = session
            .liveliness()
            .declare_token(&bridge_key)
            .await
            .map_err(|e| {
                BridgeError::liveliness(format!("Failed to declare bridge token: {}", e))
            })?;

        tracing::info!(key = %bridge_key, "Bridge liveliness token declared");

        Ok(Self {
            session,
            keys,
            bridge_token,
            device_tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Declare or undeclare the device token to match `online`.
    ///
    /// Repeating the current state is a no-op.
    pub async fn set_device_online(&self, device: &str, online: bool) -> Result<()> {
        if online {
            self.declare_device_alive(device).await
        } else {
            self.undeclare_device(device).await;
            Ok(())
        }
    }

    /// Declare a device as alive.
    pub async fn declare_device_alive(&self, device: &str) -> Result<()> {
        if self.device_tokens.read().await.contains_key(device) {
            return Ok(());
        }

        let device_key = self.keys.device_alive(device);
        let token = self
            .session
            .liveliness()
            .declare_token(&device_key)
            .await
            .map_err(|e| {
                BridgeError::liveliness(format!(
                    "Failed to declare device token for {}: {}",
                    device, e
                ))
            })?;

        tracing::debug!(device = %device, key = %device_key, "Device liveliness token declared");

        self.device_tokens
            .write()
            .await
            .insert(device.to_string(), token);

        Ok(())
    }

    /// Undeclare a device (mark as offline).
    pub async fn undeclare_device(&self, device: &str) {
        if self.device_tokens.write().await.remove(device).is_some() {
            tracing::debug!(device = %device, "Device liveliness token undeclared");
        }
    }

    /// Undeclare all device tokens.
    pub async fn undeclare_all_devices(&self) {
        let mut tokens = self.device_tokens.write().await;
        let count = tokens.len();
        tokens.clear();
        if count > 0 {
            tracing::debug!(count = count, "All device liveliness tokens undeclared");
        }
    }
}
