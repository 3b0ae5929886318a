//! Error types for the EcoFlow bridge.

use ecosight_bridge_framework::BridgeError;
use thiserror::Error;

/// Result type alias using [`EcoflowError`].
pub type Result<T> = std::result::Result<T, EcoflowError>;

/// A payload failed shape validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{schema}: invalid field '{path}': {message}")]
pub struct SchemaError {
    /// Which schema rejected the payload (e.g. "envelope", "cmdId 1 params").
    pub schema: &'static str,
    /// Path of the offending field, `.` when the payload itself is wrong.
    pub path: String,
    /// What was wrong.
    pub message: String,
}

/// Vendor REST API failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API returned code {code}: {message}")]
    Api { code: String, message: String },

    #[error("API response for {what} is malformed: {message}")]
    Malformed { what: &'static str, message: String },
}

/// Pub/sub transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid broker address: {0}")]
    BrokerAddress(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Errors that can occur in the EcoFlow bridge.
#[derive(Debug, Error)]
pub enum EcoflowError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
