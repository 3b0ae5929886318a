//! Sub-endpoints of a bridged power station and their fixed attribute sets.

use std::fmt;

use ecosight_bridge_framework::{AttributeId, AttributeValue, EndpointHandle};

/// Attribute identifiers, grouped by namespace.
pub mod attr {
    use ecosight_bridge_framework::AttributeId;

    const POWER_SOURCE: &str = "powerSource";
    const MEASUREMENT: &str = "electricalPowerMeasurement";

    /// Half-percent units, 0..=200.
    pub const BAT_PERCENT_REMAINING: AttributeId =
        AttributeId::new(POWER_SOURCE, "batPercentRemaining");
    pub const BAT_CHARGE_LEVEL: AttributeId = AttributeId::new(POWER_SOURCE, "batChargeLevel");
    pub const BAT_CHARGE_STATE: AttributeId = AttributeId::new(POWER_SOURCE, "batChargeState");
    /// Seconds, or null while charging.
    pub const BAT_TIME_REMAINING: AttributeId =
        AttributeId::new(POWER_SOURCE, "batTimeRemaining");
    pub const STATUS: AttributeId = AttributeId::new(POWER_SOURCE, "status");

    /// Milli-watts.
    pub const ACTIVE_POWER: AttributeId = AttributeId::new(MEASUREMENT, "activePower");
    /// Milli-amps.
    pub const ACTIVE_CURRENT: AttributeId = AttributeId::new(MEASUREMENT, "activeCurrent");
    /// Milli-volts.
    pub const VOLTAGE: AttributeId = AttributeId::new(MEASUREMENT, "voltage");

    pub const ON_OFF: AttributeId = AttributeId::new("onOff", "onOff");
}

const BATTERY_ATTRIBUTES: &[AttributeId] = &[
    attr::BAT_PERCENT_REMAINING,
    attr::BAT_CHARGE_LEVEL,
    attr::BAT_CHARGE_STATE,
    attr::BAT_TIME_REMAINING,
    attr::STATUS,
];
const GRID_ATTRIBUTES: &[AttributeId] = &[attr::STATUS];
const AC_INPUT_ATTRIBUTES: &[AttributeId] =
    &[attr::ACTIVE_POWER, attr::ACTIVE_CURRENT, attr::VOLTAGE];
const POWER_ONLY_ATTRIBUTES: &[AttributeId] = &[attr::ACTIVE_POWER];
const SWITCH_ATTRIBUTES: &[AttributeId] = &[attr::ON_OFF];

/// Kind of sub-endpoint exposed for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    Battery,
    Grid,
    Solar,
    AcInput,
    AcOutput,
    DcOutput,
    AcSwitch,
    DcSwitch,
}

impl EndpointKind {
    /// Every kind, in registration order.
    pub const ALL: [EndpointKind; 8] = [
        EndpointKind::Battery,
        EndpointKind::Grid,
        EndpointKind::Solar,
        EndpointKind::AcInput,
        EndpointKind::AcOutput,
        EndpointKind::DcOutput,
        EndpointKind::AcSwitch,
        EndpointKind::DcSwitch,
    ];

    /// Name used in key expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Battery => "Battery",
            EndpointKind::Grid => "Grid",
            EndpointKind::Solar => "Solar",
            EndpointKind::AcInput => "ACInput",
            EndpointKind::AcOutput => "ACOutput",
            EndpointKind::DcOutput => "DCOutput",
            EndpointKind::AcSwitch => "ACSwitch",
            EndpointKind::DcSwitch => "DCSwitch",
        }
    }

    /// The fixed attribute set of this kind.
    pub fn attributes(&self) -> &'static [AttributeId] {
        match self {
            EndpointKind::Battery => BATTERY_ATTRIBUTES,
            EndpointKind::Grid => GRID_ATTRIBUTES,
            EndpointKind::AcInput => AC_INPUT_ATTRIBUTES,
            EndpointKind::Solar | EndpointKind::AcOutput | EndpointKind::DcOutput => {
                POWER_ONLY_ATTRIBUTES
            }
            EndpointKind::AcSwitch | EndpointKind::DcSwitch => SWITCH_ATTRIBUTES,
        }
    }

    /// Create the handle for this kind on `serial`.
    pub fn handle(&self, serial: &str) -> EndpointHandle {
        EndpointHandle::new(serial, self.as_str(), self.attributes())
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Battery charge level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeLevel {
    Ok,
    Warning,
}

impl ChargeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeLevel::Ok => "ok",
            ChargeLevel::Warning => "warning",
        }
    }
}

/// Battery charging state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    IsCharging,
    IsNotCharging,
}

impl ChargeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeState::IsCharging => "isCharging",
            ChargeState::IsNotCharging => "isNotCharging",
        }
    }
}

/// Power source status of the battery or the grid connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSourceStatus {
    Active,
    Standby,
}

impl PowerSourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerSourceStatus::Active => "active",
            PowerSourceStatus::Standby => "standby",
        }
    }
}

impl From<ChargeLevel> for AttributeValue {
    fn from(v: ChargeLevel) -> Self {
        AttributeValue::from(v.as_str())
    }
}

impl From<ChargeState> for AttributeValue {
    fn from(v: ChargeState) -> Self {
        AttributeValue::from(v.as_str())
    }
}

impl From<PowerSourceStatus> for AttributeValue {
    fn from(v: PowerSourceStatus) -> Self {
        AttributeValue::from(v.as_str())
    }
}
