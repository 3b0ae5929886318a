//! Configuration for the EcoFlow bridge.

use serde::{Deserialize, Serialize};

use ecosight_bridge_framework::{
    BridgeConfig, BridgeError, Format, LoggingConfig, ZenohConfig,
};
use ecosight_common::resolve_secret;

use crate::cloud::DEFAULT_API_HOST;
use crate::commands::CommandCodes;
use crate::projector::{DEFAULT_LOW_BATTERY_THRESHOLD, ProjectionSettings};
use crate::units::VoltagePolicy;

/// Environment fallback for the access key.
pub const ACCESS_KEY_ENV: &str = "ECOFLOW_ACCESS_KEY";
/// Environment fallback for the secret key.
pub const SECRET_KEY_ENV: &str = "ECOFLOW_SECRET_KEY";

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoflowBridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// EcoFlow cloud and projection settings.
    pub ecoflow: EcoflowConfig,

    /// Format of published attribute updates.
    #[serde(default)]
    pub serialization: Format,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// EcoFlow-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoflowConfig {
    /// Key expression prefix (default: "ecosight/ecoflow").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// REST API host.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Falls back to `ECOFLOW_ACCESS_KEY`.
    #[serde(default)]
    pub access_key: Option<String>,

    /// Falls back to `ECOFLOW_SECRET_KEY`.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Only devices with this product name are bridged.
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Charge level turns to warning at or below this state of charge.
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: i64,

    #[serde(default)]
    pub voltage_policy: VoltagePolicy,

    /// Expose the Solar endpoint (MPPT input power).
    #[serde(default)]
    pub expose_solar: bool,

    #[serde(default)]
    pub commands: CommandCodes,

    /// Delete every published attribute on shutdown.
    #[serde(default)]
    pub unregister_on_shutdown: bool,
}

fn default_key_prefix() -> String {
    "ecosight/ecoflow".to_string()
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_product_name() -> String {
    "DELTA Pro Ultra".to_string()
}

fn default_low_battery_threshold() -> i64 {
    DEFAULT_LOW_BATTERY_THRESHOLD
}

/// Resolved API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl EcoflowConfig {
    /// Configured keys, falling back to the environment.
    pub fn credentials(&self) -> Result<Credentials, BridgeError> {
        Ok(Credentials {
            access_key: resolve_secret(self.access_key.as_deref(), "access_key", ACCESS_KEY_ENV)?,
            secret_key: resolve_secret(self.secret_key.as_deref(), "secret_key", SECRET_KEY_ENV)?,
        })
    }

    pub fn projection(&self) -> ProjectionSettings {
        ProjectionSettings {
            low_battery_threshold: self.low_battery_threshold,
            voltage_policy: self.voltage_policy,
        }
    }
}

impl BridgeConfig for EcoflowBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.ecoflow.key_prefix
    }

    fn serialization(&self) -> Format {
        self.serialization
    }

    fn validate(&self) -> Result<(), BridgeError> {
        let ecoflow = &self.ecoflow;

        if ecoflow.api_host.trim().is_empty() {
            return Err(BridgeError::validation("ecoflow.api_host must not be empty"));
        }
        if ecoflow.product_name.trim().is_empty() {
            return Err(BridgeError::validation("ecoflow.product_name must not be empty"));
        }
        if !(0..=100).contains(&ecoflow.low_battery_threshold) {
            return Err(BridgeError::validation(format!(
                "ecoflow.low_battery_threshold must be between 0 and 100, got {}",
                ecoflow.low_battery_threshold
            )));
        }
        if ecoflow.commands.ac_switch.is_empty() || ecoflow.commands.dc_switch.is_empty() {
            return Err(BridgeError::validation("ecoflow.commands codes must not be empty"));
        }

        ecoflow.credentials()?;
        Ok(())
    }
}
