//! EcoSight Bridge Framework
//!
//! The device-bridge side of an EcoSight bridge: the bridge owns a set of
//! devices, each exposing named sub-endpoints with a fixed attribute set, and
//! projects telemetry onto those attributes over Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`EndpointHandle`] and [`AttributeSink`] for writing attribute values
//! - [`AttributePublisher`], the Zenoh-backed [`AttributeSink`]
//! - [`CommandRegistry`] for binding endpoint commands to async handlers
//! - [`LivelinessManager`] for bridge and device presence
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use ecosight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!     let sink = runner.publisher();
//!     runner.spawn(my_worker(sink));
//!
//!     // Run until Ctrl+C
//!     runner.run_with_metadata(None, async {}).await
//! }
//! ```

mod args;
mod commands;
mod config;
mod endpoint;
mod error;
mod liveliness;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use commands::{
    CommandError, CommandOutcome, CommandRegistry, CommandRequest, serve_commands,
};
pub use config::BridgeConfig;
pub use endpoint::{AttributeId, AttributeSink, EndpointHandle};
pub use error::{BridgeError, Result};
pub use liveliness::LivelinessManager;
pub use publisher::{AttributePublisher, WriteStats};
pub use runner::BridgeRunner;
pub use status::{BridgeState, BridgeStatus, StatusPublisher};

// Re-export commonly used types from ecosight-common
pub use ecosight_common::{
    AttributeUpdate, AttributeValue, Format, KeyExprBuilder, LoggingConfig, ZenohConfig,
};
