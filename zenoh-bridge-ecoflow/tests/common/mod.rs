//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use ecosight_bridge_framework::{
    AttributeId, AttributeSink, AttributeValue, BridgeError, EndpointHandle,
};
use serde_json::Value;

use zenoh_bridge_ecoflow::bootstrap::DevicePresence;
use zenoh_bridge_ecoflow::cloud::{BrokerCredentials, CloudApi, DeviceInfo};
use zenoh_bridge_ecoflow::commands::CommandTransport;
use zenoh_bridge_ecoflow::schema::BaselineSnapshot;
use zenoh_bridge_ecoflow::{ApiError, EcoflowError, TransportError};

/// One recorded attribute write.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub device: String,
    pub endpoint: String,
    pub attribute: String,
    pub value: AttributeValue,
}

/// Sink recording every accepted write; can be told to fail one attribute.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Write>>,
    fail_on: Option<AttributeId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(attribute: AttributeId) -> Self {
        Self {
            fail_on: Some(attribute),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<Write> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    /// Last value written to `endpoint`/`attribute`.
    pub fn last(&self, endpoint: &str, attribute: AttributeId) -> Option<AttributeValue> {
        let name = attribute.to_string();
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|w| w.endpoint == endpoint && w.attribute == name)
            .map(|w| w.value.clone())
    }
}

impl AttributeSink for RecordingSink {
    async fn set_attribute(
        &self,
        endpoint: &EndpointHandle,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> ecosight_bridge_framework::Result<()> {
        endpoint.check(attribute)?;
        if self.fail_on == Some(attribute) {
            return Err(BridgeError::Publish {
                key: format!("{}/{}", endpoint, attribute),
                message: "injected failure".into(),
            });
        }

        self.writes.lock().unwrap().push(Write {
            device: endpoint.device().to_string(),
            endpoint: endpoint.endpoint().to_string(),
            attribute: attribute.to_string(),
            value,
        });
        Ok(())
    }
}

/// In-memory vendor cloud.
#[derive(Default)]
pub struct FakeCloud {
    pub devices: Vec<DeviceInfo>,
    pub baselines: HashMap<String, Value>,
    pub broker: Option<BrokerCredentials>,
}

impl FakeCloud {
    pub fn with_device(mut self, serial: &str, product: &str, online: bool) -> Self {
        self.devices.push(DeviceInfo {
            serial_number: serial.to_string(),
            product_name: product.to_string(),
            device_name: format!("{} name", serial),
            online: i64::from(online),
        });
        self
    }

    pub fn with_baseline(mut self, serial: &str, data: Value) -> Self {
        self.baselines.insert(serial.to_string(), data);
        self
    }
}

impl CloudApi for FakeCloud {
    async fn list_devices(&self) -> zenoh_bridge_ecoflow::Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    async fn baseline_properties(&self, serial: &str) -> zenoh_bridge_ecoflow::Result<BaselineSnapshot> {
        match self.baselines.get(serial) {
            Some(data) => Ok(BaselineSnapshot::parse(data.clone())?),
            None => Err(EcoflowError::Api(ApiError::Api {
                code: "1006".into(),
                message: "device not found".into(),
            })),
        }
    }

    async fn broker_credentials(&self) -> zenoh_bridge_ecoflow::Result<BrokerCredentials> {
        self.broker.clone().ok_or_else(|| {
            EcoflowError::Api(ApiError::Api {
                code: "1".into(),
                message: "no certification".into(),
            })
        })
    }
}

/// Transport recording published control messages.
#[derive(Default)]
pub struct RecordingTransport {
    pub published: Mutex<Vec<(String, Value)>>,
}

impl CommandTransport for RecordingTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let body = serde_json::from_slice(&payload).unwrap_or(Value::Null);
        self.published.lock().unwrap().push((topic.to_string(), body));
        Ok(())
    }
}

/// Presence tracker recording every connectivity change.
#[derive(Default)]
pub struct RecordingPresence {
    pub changes: Mutex<Vec<(String, bool)>>,
}

impl DevicePresence for RecordingPresence {
    async fn set_online(&self, serial: &str, online: bool) {
        self.changes.lock().unwrap().push((serial.to_string(), online));
    }
}

/// A telemetry envelope body.
pub fn envelope(cmd_id: i64, addr: &str, param: Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "cmdId": cmd_id,
        "cmdFunc": 2,
        "addr": addr,
        "param": param,
    }))
    .unwrap()
}

pub fn int(v: i64) -> AttributeValue {
    AttributeValue::Integer(v)
}
