//! Startup, baseline seeding and the end-to-end message path.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{FakeCloud, RecordingPresence, RecordingSink, RecordingTransport, envelope, int};
use zenoh_bridge_ecoflow::bootstrap::{
    apply_baseline, build_registry, discover_devices, handle_publish, register_commands,
};
use zenoh_bridge_ecoflow::commands::{CommandCodes, SwitchCommands};
use zenoh_bridge_ecoflow::endpoints::{EndpointKind, attr};
use zenoh_bridge_ecoflow::projector::{ProjectionSettings, Projector};
use zenoh_bridge_ecoflow::registry::{Device, DeviceEndpoints};
use zenoh_bridge_ecoflow::router::{RouteOutcome, TelemetryRouter};
use zenoh_bridge_ecoflow::schema::{ADDR_APP_SHOW, BaselineSnapshot};

const PRODUCT: &str = "DELTA Pro Ultra";

#[tokio::test]
async fn test_end_to_end_scenario() {
    let cloud = FakeCloud::default()
        .with_device("DPU1", PRODUCT, true)
        .with_baseline("DPU1", json!({"hs_yj751_pd_appshow_addr.soc": 80}));
    let sink = Arc::new(RecordingSink::new());
    let projector = Projector::default();

    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    assert_eq!(devices.len(), 1);

    let (registry, seeded) = build_registry(&cloud, &sink, &projector, &devices, false).await;
    assert_eq!(seeded.success, 2);
    assert_eq!(sink.last("Battery", attr::BAT_PERCENT_REMAINING), Some(int(160)));
    assert_eq!(sink.last("Battery", attr::BAT_CHARGE_LEVEL), Some("ok".into()));

    let router = TelemetryRouter::new(Arc::new(registry), projector, sink.clone());
    router
        .handle_message(
            "/open/open-abc/DPU1/quota",
            &envelope(1, ADDR_APP_SHOW, json!({"soc": 40})),
        )
        .await;

    assert_eq!(sink.last("Battery", attr::BAT_PERCENT_REMAINING), Some(int(80)));
    // Threshold 10: soc 40 stays Ok.
    assert_eq!(sink.last("Battery", attr::BAT_CHARGE_LEVEL), Some("ok".into()));
}

#[tokio::test]
async fn test_stricter_threshold_scenario() {
    let cloud = FakeCloud::default()
        .with_device("DPU1", PRODUCT, true)
        .with_baseline("DPU1", json!({"hs_yj751_pd_appshow_addr.soc": 80}));
    let sink = Arc::new(RecordingSink::new());
    let projector = Projector::new(ProjectionSettings {
        low_battery_threshold: 50,
        ..Default::default()
    });

    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    let (registry, _) = build_registry(&cloud, &sink, &projector, &devices, false).await;
    let router = TelemetryRouter::new(Arc::new(registry), projector, sink.clone());
    router
        .handle_message(
            "/open/open-abc/DPU1/quota",
            &envelope(1, ADDR_APP_SHOW, json!({"soc": 40})),
        )
        .await;

    assert_eq!(sink.last("Battery", attr::BAT_CHARGE_LEVEL), Some("warning".into()));
}

#[tokio::test]
async fn test_discover_filters_product() {
    let cloud = FakeCloud::default()
        .with_device("DPU1", PRODUCT, true)
        .with_device("R3", "RIVER 3", true)
        .with_device("DPU2", PRODUCT, false);

    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["DPU1", "DPU2"]);
}

#[tokio::test]
async fn test_registry_keeps_device_without_baseline() {
    let cloud = FakeCloud::default()
        .with_device("DPU1", PRODUCT, true)
        .with_device("DPU2", PRODUCT, true)
        .with_baseline("DPU1", json!({"hs_yj751_pd_appshow_addr.soc": 20}));
    let sink = RecordingSink::new();

    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    let (registry, seeded) =
        build_registry(&cloud, &sink, &Projector::default(), &devices, true).await;

    assert_eq!(registry.serials(), vec!["DPU1".to_string(), "DPU2".to_string()]);
    assert_eq!(seeded.success, 2);
    assert!(sink.writes().iter().all(|w| w.device == "DPU1"));

    let dpu2 = registry.lookup("DPU2").unwrap();
    assert_eq!(dpu2.device().display_name, "DPU2 name");
    assert!(dpu2.get(EndpointKind::Solar).is_some());
}

#[tokio::test]
async fn test_baseline_groups_project_independently() {
    let device = DeviceEndpoints::standard(Device::new("DPU1", PRODUCT, "Home"), false);
    let snapshot = BaselineSnapshot::parse(json!({
        "hs_yj751_pd_appshow_addr.soc": 70,
        "hs_yj751_pd_appshow_addr.showFlag": 4,
        "hs_yj751_pd_backend_addr.acOutFreq": 59.5,
        "hs_yj751_pd_backend_addr.bmsInputWatts": 10,
        "hs_yj751_pd_app_set_info_addr.chgMaxSoc": 100,
        "hs_yj751_bms_slave_addr.cycles": 12,
        "plainKey": 1
    }))
    .unwrap();
    let sink = RecordingSink::new();

    let stats = apply_baseline(&Projector::default(), &sink, &device, &snapshot).await;

    // Backend group is malformed as a whole; appshow group still applies.
    assert_eq!(stats.success, 4);
    assert_eq!(sink.last("Battery", attr::BAT_PERCENT_REMAINING), Some(int(140)));
    assert_eq!(sink.last("ACSwitch", attr::ON_OFF), Some(true.into()));
    assert_eq!(sink.last("DCSwitch", attr::ON_OFF), Some(false.into()));
    assert_eq!(sink.last("Battery", attr::BAT_CHARGE_STATE), None);
}

#[tokio::test]
async fn test_baseline_uses_backend_rules() {
    let device = DeviceEndpoints::standard(Device::new("DPU1", PRODUCT, "Home"), false);
    let snapshot = BaselineSnapshot::parse(json!({
        "hs_yj751_pd_backend_addr.inAc5p8Amp": 2,
        "hs_yj751_pd_backend_addr.inAcC20Amp": 0.5,
        "hs_yj751_pd_backend_addr.inAc5p8Vol": 0,
        "hs_yj751_pd_backend_addr.inAcC20Vol": 230
    }))
    .unwrap();
    let sink = RecordingSink::new();

    apply_baseline(&Projector::default(), &sink, &device, &snapshot).await;

    assert_eq!(sink.last("ACInput", attr::ACTIVE_CURRENT), Some(int(2_500)));
    assert_eq!(sink.last("ACInput", attr::VOLTAGE), Some(int(230_000)));
}

#[tokio::test]
async fn test_switch_commands_publish_control_messages() {
    let cloud = FakeCloud::default().with_device("DPU1", PRODUCT, true);
    let sink = RecordingSink::new();
    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    let (registry, _) = build_registry(&cloud, &sink, &Projector::default(), &devices, false).await;

    let transport = Arc::new(RecordingTransport::default());
    let switches = Arc::new(SwitchCommands::new(
        transport.clone(),
        "open-abc",
        CommandCodes::default(),
    ));
    let commands = register_commands(&switches, &registry);
    assert_eq!(commands.len(), 4);

    assert!(commands.dispatch("DPU1", "ACSwitch", "on").await.ok);
    assert!(commands.dispatch("DPU1", "DCSwitch", "off").await.ok);
    let unknown = commands.dispatch("DPU1", "ACSwitch", "toggle").await;
    assert!(!unknown.ok);
    assert!(unknown.error.is_some());

    let published = transport.published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].0, "/open/open-abc/DPU1/set");
    assert_eq!(published[0].1["cmdCode"], "YJ751_PD_AC_DSG_SET");
    assert_eq!(published[0].1["params"]["enable"], 1);
    assert_eq!(published[1].1["cmdCode"], "YJ751_PD_DC_SWITCH_SET");
    assert_eq!(published[1].1["params"]["enable"], 0);
    assert_eq!(published[1].1["sn"], "DPU1");

    // Commands do not touch attributes; telemetry does.
    assert!(sink.writes().is_empty());
}

#[tokio::test]
async fn test_handle_publish_tracks_presence() {
    let cloud = FakeCloud::default().with_device("DPU1", PRODUCT, true);
    let sink = RecordingSink::new();
    let devices = discover_devices(&cloud, PRODUCT).await.unwrap();
    let (registry, _) = build_registry(&cloud, &sink, &Projector::default(), &devices, false).await;
    let router = TelemetryRouter::new(Arc::new(registry), Projector::default(), sink);
    let presence = RecordingPresence::default();

    handle_publish(&router, &presence, "/open/a/DPU1/status", br#"{"params":{"status":0}}"#).await;
    handle_publish(&router, &presence, "/open/a/DPU1/status", br#"{"params":{"status":1}}"#).await;
    handle_publish(&router, &presence, "/open/a/GHOST/status", br#"{"params":{"status":1}}"#).await;
    let outcome = handle_publish(
        &router,
        &presence,
        "/open/a/DPU1/quota",
        &envelope(1, ADDR_APP_SHOW, json!({"soc": 12})),
    )
    .await;

    assert!(matches!(outcome, RouteOutcome::Projected { .. }));
    assert_eq!(
        *presence.changes.lock().unwrap(),
        vec![("DPU1".to_string(), false), ("DPU1".to_string(), true)]
    );
}
