//! Zenoh bridge for EcoFlow DELTA Pro Ultra power stations.

use std::sync::Arc;

use anyhow::{Context, Result};
use ecosight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use zenoh_bridge_ecoflow::bootstrap::{self, DevicePresence};
use zenoh_bridge_ecoflow::cloud::{CloudApi, EcoflowRestClient};
use zenoh_bridge_ecoflow::commands::SwitchCommands;
use zenoh_bridge_ecoflow::config::EcoflowBridgeConfig;
use zenoh_bridge_ecoflow::mqtt::BrokerConnection;
use zenoh_bridge_ecoflow::projector::Projector;
use zenoh_bridge_ecoflow::router::TelemetryRouter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("ecoflow.json5");

    let config = EcoflowBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut runner = BridgeRunner::new_with_args("ecoflow", config, Some(&args))
        .await
        .context("Failed to start bridge")?;

    let ecoflow = runner.config().ecoflow.clone();
    let credentials = ecoflow.credentials()?;
    let cloud = EcoflowRestClient::new(
        &ecoflow.api_host,
        credentials.access_key,
        credentials.secret_key,
    )?;

    let devices = match bootstrap::discover_devices(&cloud, &ecoflow.product_name).await {
        Ok(devices) => devices,
        Err(e) => {
            runner.report_error(e.to_string()).await;
            return Err(e).context("Failed to list devices");
        }
    };

    let publisher = runner.publisher();
    let projector = Projector::new(ecoflow.projection());
    let (registry, seeded) =
        bootstrap::build_registry(&cloud, &publisher, &projector, &devices, ecoflow.expose_solar)
            .await;
    let registry = Arc::new(registry);

    let liveliness = runner.liveliness();
    for device in &devices {
        liveliness
            .set_online(&device.serial_number, device.is_online())
            .await;
    }

    let broker = match cloud.broker_credentials().await {
        Ok(broker) => broker,
        Err(e) => {
            runner.report_error(e.to_string()).await;
            return Err(e).context("Failed to fetch broker credentials");
        }
    };
    let connection = BrokerConnection::open(&broker, &registry.serials())?;

    let switches = Arc::new(SwitchCommands::new(
        connection.transport(),
        &broker.username,
        ecoflow.commands.clone(),
    ));
    runner.serve_commands(bootstrap::register_commands(&switches, &registry));

    tracing::info!(
        prefix = %ecoflow.key_prefix,
        broker = %broker.url(),
        devices = registry.len(),
        seeded = seeded.success,
        "EcoFlow bridge running"
    );

    let router = Arc::new(TelemetryRouter::new(
        registry.clone(),
        projector,
        publisher.clone(),
    ));
    let presence = liveliness.clone();
    runner.spawn(async move {
        connection
            .run(move |publish| {
                let router = router.clone();
                let presence = presence.clone();
                async move {
                    bootstrap::handle_publish(&router, &presence, &publish.topic, &publish.payload)
                        .await;
                }
            })
            .await;
    });

    let metadata = serde_json::json!({
        "product": ecoflow.product_name,
        "devices": registry.serials(),
        "expose_solar": ecoflow.expose_solar,
    });

    let unregister = ecoflow.unregister_on_shutdown;
    runner
        .run_with_metadata(Some(metadata), async move {
            if unregister {
                bootstrap::unregister_all(&publisher, &registry).await;
            }
        })
        .await?;

    Ok(())
}
