use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single attribute write emitted by a bridge.
///
/// Published on `<prefix>/<device>/<endpoint>/<namespace>/<attribute>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeUpdate {
    /// Unix epoch milliseconds when the value was projected.
    pub timestamp: i64,

    /// Device identifier (serial number).
    pub device: String,

    /// Sub-endpoint name (e.g., "Battery", "ACInput").
    pub endpoint: String,

    /// Attribute namespace (e.g., "powerSource").
    pub namespace: String,

    /// Attribute name within the namespace (e.g., "batPercentRemaining").
    pub attribute: String,

    /// The new value.
    pub value: AttributeValue,
}

impl AttributeUpdate {
    /// Create a new attribute update with the current timestamp.
    pub fn new(
        device: impl Into<String>,
        endpoint: impl Into<String>,
        namespace: impl Into<String>,
        attribute: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            device: device.into(),
            endpoint: endpoint.into(),
            namespace: namespace.into(),
            attribute: attribute.into(),
            value,
        }
    }

    /// Key suffix relative to a bridge prefix: `<device>/<endpoint>/<namespace>/<attribute>`.
    pub fn key_suffix(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.device, self.endpoint, self.namespace, self.attribute
        )
    }
}

/// Typed attribute value.
///
/// `Null` is an explicit "no value" and is distinct from "not written".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Explicitly no value.
    #[default]
    Null,

    /// Boolean value (on/off).
    Boolean(bool),

    /// Integer value (percentages, milli-units, seconds).
    Integer(i64),

    /// Enumerated label (e.g., "ok", "isCharging").
    Text(String),
}

impl AttributeValue {
    /// Returns true for [`AttributeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Boolean(v) => write!(f, "{}", v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
