//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Zenoh session error.
    #[error("Zenoh session error: {0}")]
    ZenohSession(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// The attribute is not part of the endpoint's fixed attribute set.
    #[error("Endpoint {device}/{endpoint} has no attribute {namespace}.{attribute}")]
    UnsupportedAttribute {
        device: String,
        endpoint: String,
        namespace: String,
        attribute: String,
    },

    /// Liveliness token error.
    #[error("Liveliness error: {0}")]
    Liveliness(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a liveliness error.
    pub fn liveliness(msg: impl Into<String>) -> Self {
        Self::Liveliness(msg.into())
    }
}

impl From<zenoh::Error> for BridgeError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<ecosight_common::Error> for BridgeError {
    fn from(err: ecosight_common::Error) -> Self {
        use ecosight_common::Error as CommonError;
        match err {
            CommonError::Config(msg) => Self::Config(msg),
            CommonError::MissingSecret { .. } => Self::ConfigValidation(err.to_string()),
            CommonError::Zenoh(e) => Self::ZenohSession(e.to_string()),
            CommonError::Json(e) => Self::Serialization(e.to_string()),
            CommonError::Cbor(msg) => Self::Serialization(msg),
            CommonError::Io(e) => Self::Io(e),
            CommonError::KeyExpr(msg) => Self::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_maps_to_validation() {
        let err: BridgeError = ecosight_common::Error::MissingSecret {
            name: "access_key".into(),
            env: "ECOFLOW_ACCESS_KEY".into(),
        }
        .into();
        assert!(matches!(err, BridgeError::ConfigValidation(_)));
        assert!(err.to_string().contains("ECOFLOW_ACCESS_KEY"));
    }

    #[test]
    fn test_unsupported_attribute_message() {
        let err = BridgeError::UnsupportedAttribute {
            device: "DPU123".into(),
            endpoint: "Grid".into(),
            namespace: "onOff".into(),
            attribute: "onOff".into(),
        };
        assert_eq!(
            err.to_string(),
            "Endpoint DPU123/Grid has no attribute onOff.onOff"
        );
    }
}
