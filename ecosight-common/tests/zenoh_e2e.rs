//! End-to-end tests with Zenoh pub/sub.
//!
//! A single local session with multicast scouting disabled publishes to its own
//! subscriber, so no network peers are involved.
//!
//! Note: Zenoh requires multi-thread tokio runtime.

use std::time::Duration;

use ecosight_common::session::build_zenoh_config;
use ecosight_common::{
    AttributeUpdate, AttributeValue, Format, KeyExprBuilder, ZenohConfig, decode_auto, encode,
};

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}/ecoflow", nanos)
}

async fn open_local_session() -> zenoh::Session {
    let mut config = build_zenoh_config(&ZenohConfig::default()).expect("Invalid config");
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .expect("Failed to disable scouting");
    zenoh::open(config)
        .await
        .expect("Failed to open Zenoh session")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attribute_update_pubsub() {
    let builder = KeyExprBuilder::new(unique_prefix());
    let session = open_local_session().await;

    let subscriber = session
        .declare_subscriber(builder.device_wildcard("DPU123"))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    for format in [Format::Json, Format::Cbor] {
        let update = AttributeUpdate::new(
            "DPU123",
            "ACOutput",
            "electricalPowerMeasurement",
            "activePower",
            AttributeValue::Integer(1_250_000),
        );
        let key = builder.attribute(
            &update.device,
            &update.endpoint,
            &update.namespace,
            &update.attribute,
        );

        session
            .put(&key, encode(&update, format).expect("Failed to encode"))
            .encoding(format.encoding())
            .await
            .expect("Failed to publish");

        let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
            .await
            .expect("Timeout waiting for message")
            .expect("Failed to receive message");

        assert_eq!(received.key_expr().as_str(), key);
        let decoded: AttributeUpdate =
            decode_auto(&received.payload().to_bytes()).expect("Failed to decode");
        assert_eq!(decoded.value, AttributeValue::Integer(1_250_000));
    }

    drop(subscriber);
    session.close().await.expect("Failed to close session");
}
