//! Serial number to sub-endpoint lookup.
//!
//! Populated during startup, then shared read-only with the message path.

use std::collections::{BTreeMap, HashMap};

use ecosight_bridge_framework::EndpointHandle;

use crate::endpoints::EndpointKind;

/// A bridged power station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub serial: String,
    pub product_name: String,
    pub display_name: String,
}

impl Device {
    pub fn new(
        serial: impl Into<String>,
        product_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            product_name: product_name.into(),
            display_name: display_name.into(),
        }
    }
}

/// The sub-endpoints exposed for one device.
#[derive(Debug, Clone)]
pub struct DeviceEndpoints {
    device: Device,
    endpoints: BTreeMap<EndpointKind, EndpointHandle>,
}

impl DeviceEndpoints {
    /// Build handles for `kinds` on `device`.
    pub fn new(device: Device, kinds: impl IntoIterator<Item = EndpointKind>) -> Self {
        let endpoints = kinds
            .into_iter()
            .map(|kind| (kind, kind.handle(&device.serial)))
            .collect();
        Self { device, endpoints }
    }

    /// Every kind except `Solar`, which only some builds expose.
    pub fn standard(device: Device, expose_solar: bool) -> Self {
        let kinds = EndpointKind::ALL
            .into_iter()
            .filter(|kind| expose_solar || *kind != EndpointKind::Solar);
        Self::new(device, kinds)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn serial(&self) -> &str {
        &self.device.serial
    }

    /// Handle of `kind`, if this device exposes it.
    pub fn get(&self, kind: EndpointKind) -> Option<&EndpointHandle> {
        self.endpoints.get(&kind)
    }

    /// All handles in kind order.
    pub fn handles(&self) -> impl Iterator<Item = &EndpointHandle> {
        self.endpoints.values()
    }
}

/// Map from serial number to [`DeviceEndpoints`].
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceEndpoints>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `endpoints` unless the serial is already registered.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn register(&mut self, endpoints: DeviceEndpoints) -> bool {
        let serial = endpoints.serial().to_string();
        if self.devices.contains_key(&serial) {
            tracing::debug!(serial = %serial, "Device already registered");
            return false;
        }
        self.devices.insert(serial, endpoints);
        true
    }

    pub fn lookup(&self, serial: &str) -> Option<&DeviceEndpoints> {
        self.devices.get(serial)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Registered serial numbers, sorted.
    pub fn serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.devices.keys().cloned().collect();
        serials.sort();
        serials
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceEndpoints> {
        self.devices.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(serial: &str) -> Device {
        Device::new(serial, "DELTA Pro Ultra", "Garage")
    }

    #[test]
    fn test_standard_endpoints() {
        let without = DeviceEndpoints::standard(device("DPU1"), false);
        assert!(without.get(EndpointKind::Solar).is_none());
        assert_eq!(without.handles().count(), 7);

        let with = DeviceEndpoints::standard(device("DPU1"), true);
        assert_eq!(with.get(EndpointKind::Solar).unwrap().to_string(), "DPU1/Solar");
        assert_eq!(with.handles().count(), 8);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.register(DeviceEndpoints::standard(device("DPU1"), false)));
        assert!(!registry.register(DeviceEndpoints::standard(device("DPU1"), true)));

        assert_eq!(registry.len(), 1);
        let entry = registry.lookup("DPU1").unwrap();
        assert!(entry.get(EndpointKind::Solar).is_none());
    }

    #[test]
    fn test_lookup_unknown() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.is_empty());
        registry.register(DeviceEndpoints::new(device("B"), [EndpointKind::Battery]));
        registry.register(DeviceEndpoints::new(device("A"), [EndpointKind::Grid]));

        assert!(registry.lookup("C").is_none());
        assert_eq!(registry.serials(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(registry.lookup("B").unwrap().device().display_name, "Garage");
    }
}
