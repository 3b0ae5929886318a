//! Startup and shutdown of the bridged device set.
//!
//! Startup lists the account's devices, keeps those of the configured
//! product, registers their endpoints, seeds attribute values from the REST
//! snapshot and only then hands the finished registry to the message path.

use std::future::Future;
use std::sync::Arc;

use ecosight_bridge_framework::{
    AttributePublisher, AttributeSink, CommandRegistry, LivelinessManager, WriteStats,
};

use crate::cloud::{CloudApi, DeviceInfo};
use crate::commands::{CommandTransport, SwitchCommands};
use crate::error::Result;
use crate::projector::Projector;
use crate::registry::{Device, DeviceEndpoints, DeviceRegistry};
use crate::router::{RouteOutcome, TelemetryRouter};
use crate::schema::{BaselineSnapshot, Family, FamilyParams};

/// Tracks whether each device is reachable.
pub trait DevicePresence: Send + Sync {
    fn set_online(&self, serial: &str, online: bool) -> impl Future<Output = ()> + Send;
}

impl DevicePresence for LivelinessManager {
    async fn set_online(&self, serial: &str, online: bool) {
        if let Err(e) = self.set_device_online(serial, online).await {
            tracing::warn!(serial = %serial, error = %e, "Failed to update device liveliness");
        }
    }
}

impl<P: DevicePresence> DevicePresence for Arc<P> {
    fn set_online(&self, serial: &str, online: bool) -> impl Future<Output = ()> + Send {
        (**self).set_online(serial, online)
    }
}

/// Devices of `product_name` bound to the account.
pub async fn discover_devices<C: CloudApi>(cloud: &C, product_name: &str) -> Result<Vec<DeviceInfo>> {
    let all = cloud.list_devices().await?;
    let total = all.len();

    let matching: Vec<DeviceInfo> = all
        .into_iter()
        .filter(|device| device.product_name == product_name)
        .collect();

    tracing::info!(
        product = %product_name,
        total,
        matching = matching.len(),
        "Discovered devices"
    );
    Ok(matching)
}

/// Project every recognized address group of `snapshot` onto `device`.
///
/// A group failing validation is skipped; the others still apply.
pub async fn apply_baseline<S: AttributeSink>(
    projector: &Projector,
    sink: &S,
    device: &DeviceEndpoints,
    snapshot: &BaselineSnapshot,
) -> WriteStats {
    let mut stats = WriteStats::default();

    for (addr, fields) in snapshot.groups() {
        let Some(family) = Family::from_addr(addr) else {
            tracing::trace!(serial = %device.serial(), addr = %addr, "Skipping baseline group");
            continue;
        };

        match FamilyParams::validate(family, fields) {
            Ok(params) => {
                let writes = projector.project(device, &params);
                stats.merge(projector.apply(sink, writes).await);
            }
            Err(e) => {
                tracing::warn!(
                    serial = %device.serial(),
                    addr = %addr,
                    error = %e,
                    "Skipping malformed baseline group"
                );
            }
        }
    }

    stats
}

/// Register endpoints for `devices` and seed them from their baselines.
///
/// A device whose snapshot cannot be fetched is still registered; its
/// attributes stay unset until telemetry arrives.
pub async fn build_registry<C: CloudApi, S: AttributeSink>(
    cloud: &C,
    sink: &S,
    projector: &Projector,
    devices: &[DeviceInfo],
    expose_solar: bool,
) -> (DeviceRegistry, WriteStats) {
    let mut registry = DeviceRegistry::new();
    let mut stats = WriteStats::default();

    for info in devices {
        let device = Device::new(
            &info.serial_number,
            &info.product_name,
            info.display_name(),
        );
        let endpoints = DeviceEndpoints::standard(device, expose_solar);

        match cloud.baseline_properties(&info.serial_number).await {
            Ok(snapshot) => {
                let seeded = apply_baseline(projector, sink, &endpoints, &snapshot).await;
                tracing::info!(
                    serial = %info.serial_number,
                    name = %info.display_name(),
                    written = seeded.success,
                    failed = seeded.failed,
                    "Seeded device from baseline"
                );
                stats.merge(seeded);
            }
            Err(e) => {
                tracing::warn!(
                    serial = %info.serial_number,
                    error = %e,
                    "Failed to fetch baseline, registering without initial values"
                );
            }
        }

        registry.register(endpoints);
    }

    (registry, stats)
}

/// Bind switch commands for every registered device.
pub fn register_commands<T: CommandTransport + 'static>(
    switches: &Arc<SwitchCommands<T>>,
    registry: &DeviceRegistry,
) -> CommandRegistry {
    let mut commands = CommandRegistry::new();
    for device in registry.iter() {
        switches.register(&mut commands, device);
    }
    commands
}

/// Route one broker message and apply connectivity changes.
pub async fn handle_publish<S: AttributeSink, P: DevicePresence>(
    router: &TelemetryRouter<S>,
    presence: &P,
    topic: &str,
    payload: &[u8],
) -> RouteOutcome {
    let outcome = router.handle_message(topic, payload).await;

    if let RouteOutcome::DeviceStatus { serial, online } = &outcome {
        tracing::info!(serial = %serial, online, "Device connectivity changed");
        presence.set_online(serial, *online).await;
    }

    outcome
}

/// Delete every published attribute of the registered devices.
pub async fn unregister_all(publisher: &AttributePublisher, registry: &DeviceRegistry) {
    for device in registry.iter() {
        for endpoint in device.handles() {
            if let Err(e) = publisher.unregister(endpoint).await {
                tracing::warn!(endpoint = %endpoint, error = %e, "Failed to unregister endpoint");
            }
        }
        tracing::info!(serial = %device.serial(), "Unregistered device");
    }
}
