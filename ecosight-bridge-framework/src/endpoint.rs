//! Endpoints and the attribute-write seam.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ecosight_common::AttributeValue;

use crate::error::{BridgeError, Result};

/// A namespaced attribute name, e.g. `powerSource.batPercentRemaining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId {
    pub namespace: &'static str,
    pub name: &'static str,
}

impl AttributeId {
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Reference to one sub-endpoint of a bridged device.
///
/// The attribute set is fixed when the handle is created; only values change
/// afterwards. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    device: Arc<str>,
    endpoint: &'static str,
    attributes: &'static [AttributeId],
}

impl EndpointHandle {
    /// Create a handle for `endpoint` on `device` exposing `attributes`.
    pub fn new(
        device: impl Into<Arc<str>>,
        endpoint: &'static str,
        attributes: &'static [AttributeId],
    ) -> Self {
        Self {
            device: device.into(),
            endpoint,
            attributes,
        }
    }

    /// Serial number of the owning device.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Endpoint name (e.g., "Battery").
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// The fixed attribute set.
    pub fn attributes(&self) -> &'static [AttributeId] {
        self.attributes
    }

    /// Whether `attribute` belongs to this endpoint.
    pub fn supports(&self, attribute: AttributeId) -> bool {
        self.attributes.contains(&attribute)
    }

    /// Fail with [`BridgeError::UnsupportedAttribute`] unless `attribute` belongs here.
    pub fn check(&self, attribute: AttributeId) -> Result<()> {
        if self.supports(attribute) {
            Ok(())
        } else {
            Err(BridgeError::UnsupportedAttribute {
                device: self.device.to_string(),
                endpoint: self.endpoint.to_string(),
                namespace: attribute.namespace.to_string(),
                attribute: attribute.name.to_string(),
            })
        }
    }
}

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.endpoint)
    }
}

/// Destination of attribute writes.
///
/// Each call completes (or fails) independently; there is no transaction
/// across calls.
pub trait AttributeSink: Send + Sync {
    /// Set `attribute` of `endpoint` to `value`.
    fn set_attribute(
        &self,
        endpoint: &EndpointHandle,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<S: AttributeSink> AttributeSink for Arc<S> {
    fn set_attribute(
        &self,
        endpoint: &EndpointHandle,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).set_attribute(endpoint, attribute, value)
    }
}
