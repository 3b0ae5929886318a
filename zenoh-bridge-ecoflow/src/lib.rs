//! Zenoh bridge for EcoFlow DELTA Pro Ultra power stations.
//!
//! Telemetry pushed by the EcoFlow broker is validated, normalized and
//! projected onto a fixed set of endpoint attributes published to Zenoh.
//! Switch commands received over Zenoh are forwarded to the device.
//!
//! # Key Expressions
//!
//! ```text
//! ecosight/ecoflow/<serial>/<endpoint>/<namespace>/<attribute>
//! ecosight/ecoflow/<serial>/<endpoint>/@/command
//! ```
//!
//! Where:
//! - `<endpoint>` - `Battery`, `Grid`, `Solar`, `ACInput`, `ACOutput`,
//!   `DCOutput`, `ACSwitch` or `DCSwitch`
//! - `<namespace>` - `powerSource`, `electricalPowerMeasurement` or `onOff`

pub mod bootstrap;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod mqtt;
pub mod projector;
pub mod registry;
pub mod router;
pub mod schema;
pub mod units;

pub use error::{ApiError, EcoflowError, Result, SchemaError, TransportError};
