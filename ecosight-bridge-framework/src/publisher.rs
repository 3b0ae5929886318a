//! Attribute publisher for Zenoh.

use std::future::Future;
use std::sync::Arc;

use ecosight_common::{AttributeUpdate, AttributeValue, Format, KeyExprBuilder, encode};

use crate::endpoint::{AttributeId, AttributeSink, EndpointHandle};
use crate::error::{BridgeError, Result};

/// Publishes attribute values to Zenoh.
///
/// Each write becomes an [`AttributeUpdate`] put on
/// `<prefix>/<device>/<endpoint>/<namespace>/<attribute>`.
#[derive(Clone, Debug)]
pub struct AttributePublisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl AttributePublisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, key_prefix: impl Into<String>, format: Format) -> Self {
        Self {
            session,
            keys: KeyExprBuilder::new(key_prefix),
            format,
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Key expression builder for this bridge.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    async fn put_update(&self, update: &AttributeUpdate) -> Result<()> {
        let key = self.keys.attribute(
            &update.device,
            &update.endpoint,
            &update.namespace,
            &update.attribute,
        );
        let payload =
            encode(update, self.format).map_err(|e| BridgeError::Serialization(e.to_string()))?;

        self.session
            .put(&key, payload)
            .encoding(self.format.encoding())
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.clone(),
                message: e.to_string(),
            })?;

        tracing::trace!(key = %key, value = %update.value, "Published attribute");
        Ok(())
    }

    /// Remove every attribute of `endpoint` from Zenoh.
    ///
    /// Attempts all deletions and returns the first error, if any.
    pub async fn unregister(&self, endpoint: &EndpointHandle) -> Result<()> {
        let mut first_error = None;

        for attribute in endpoint.attributes() {
            let key = self.keys.attribute(
                endpoint.device(),
                endpoint.endpoint(),
                attribute.namespace,
                attribute.name,
            );
            if let Err(e) = self.session.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete attribute");
                first_error.get_or_insert(BridgeError::Publish {
                    key,
                    message: e.to_string(),
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Publish raw bytes to a key (for status messages, etc.).
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}

impl AttributeSink for AttributePublisher {
    fn set_attribute(
        &self,
        endpoint: &EndpointHandle,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> impl Future<Output = Result<()>> + Send {
        let checked = endpoint.check(attribute).map(|()| {
            AttributeUpdate::new(
                endpoint.device(),
                endpoint.endpoint(),
                attribute.namespace,
                attribute.name,
                value,
            )
        });

        async move { self.put_update(&checked?).await }
    }
}

/// Statistics from applying a set of attribute writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of successful writes.
    pub success: usize,
    /// Number of failed writes.
    pub failed: usize,
}

impl WriteStats {
    /// Total number of attempted writes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }

    /// Fold another set of statistics into this one.
    pub fn merge(&mut self, other: WriteStats) {
        self.success += other.success;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_stats() {
        let mut stats = WriteStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.success = 8;
        stats.failed = 2;
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.success_rate(), 80.0);

        stats.merge(WriteStats {
            success: 2,
            failed: 0,
        });
        assert_eq!(stats.total(), 12);
    }
}
