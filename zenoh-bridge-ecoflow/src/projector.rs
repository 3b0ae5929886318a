//! Projection of validated parameters onto endpoint attributes.
//!
//! Each rule fires only when all of its input fields are present in the
//! current message and the target endpoint exists. Nothing is carried over
//! between messages.

use ecosight_bridge_framework::{
    AttributeId, AttributeSink, AttributeValue, EndpointHandle, WriteStats,
};

use crate::endpoints::{
    ChargeLevel, ChargeState, EndpointKind, PowerSourceStatus, attr,
};
use crate::registry::DeviceEndpoints;
use crate::schema::{Family1Params, Family2Params, FamilyParams};
use crate::units::{self, VoltagePolicy};

/// Default `soc` at or below which the charge level is a warning.
pub const DEFAULT_LOW_BATTERY_THRESHOLD: i64 = 10;

/// Tunables of the rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionSettings {
    /// Charge level is `Ok` strictly above this `soc`.
    pub low_battery_threshold: i64,
    /// Resolution of two energized AC input voltage legs.
    pub voltage_policy: VoltagePolicy,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
            voltage_policy: VoltagePolicy::default(),
        }
    }
}

/// One computed attribute write.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeWrite {
    pub endpoint: EndpointHandle,
    pub attribute: AttributeId,
    pub value: AttributeValue,
}

/// Accumulates writes for the endpoints a device actually exposes.
struct Writes<'a> {
    device: &'a DeviceEndpoints,
    writes: Vec<AttributeWrite>,
}

impl<'a> Writes<'a> {
    fn new(device: &'a DeviceEndpoints) -> Self {
        Self {
            device,
            writes: Vec::new(),
        }
    }

    fn push(&mut self, kind: EndpointKind, attribute: AttributeId, value: impl Into<AttributeValue>) {
        if let Some(endpoint) = self.device.get(kind) {
            self.writes.push(AttributeWrite {
                endpoint: endpoint.clone(),
                attribute,
                value: value.into(),
            });
        }
    }
}

/// Stateless rule engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector {
    settings: ProjectionSettings,
}

impl Projector {
    pub fn new(settings: ProjectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProjectionSettings {
        &self.settings
    }

    /// Writes for one validated family payload.
    pub fn project(&self, device: &DeviceEndpoints, params: &FamilyParams) -> Vec<AttributeWrite> {
        match params {
            FamilyParams::PowerState(p) => self.project_power_state(device, p),
            FamilyParams::Backend(p) => self.project_backend(device, p),
            FamilyParams::SetInfo(_) => Vec::new(),
        }
    }

    /// Rule set of `cmdId` 1.
    pub fn project_power_state(
        &self,
        device: &DeviceEndpoints,
        p: &Family1Params,
    ) -> Vec<AttributeWrite> {
        let mut out = Writes::new(device);

        if let Some(soc) = p.soc {
            let level = if soc > self.settings.low_battery_threshold {
                ChargeLevel::Ok
            } else {
                ChargeLevel::Warning
            };
            // Out-of-range readings skip the percentage but keep the level.
            if let Some(percent) = soc.checked_mul(2) {
                out.push(EndpointKind::Battery, attr::BAT_PERCENT_REMAINING, percent);
            }
            out.push(EndpointKind::Battery, attr::BAT_CHARGE_LEVEL, level);
        }

        if let (Some(remain), Some(watts_in)) = (p.remain_time, p.watts_in_sum) {
            // Remaining time is meaningless while charging.
            let seconds = if watts_in == 0.0 {
                remain.checked_mul(60).map(Some)
            } else {
                Some(None)
            };
            if let Some(seconds) = seconds {
                out.push(EndpointKind::Battery, attr::BAT_TIME_REMAINING, seconds);
            }
        }

        let input = p.ac_input_legs();
        if units::any_leg(&input) {
            let status = if input.iter().flatten().any(|w| *w > 0.0) {
                PowerSourceStatus::Active
            } else {
                PowerSourceStatus::Standby
            };
            out.push(EndpointKind::Grid, attr::STATUS, status);
            out.push(
                EndpointKind::AcInput,
                attr::ACTIVE_POWER,
                units::to_milli(units::sum_legs(&input)),
            );
        }

        let ac_output = p.ac_output_legs();
        let dc_output = p.dc_output_legs();
        let solar = p.solar_legs();
        let power_legs: [(EndpointKind, &[Option<f64>]); 3] = [
            (EndpointKind::AcOutput, &ac_output),
            (EndpointKind::DcOutput, &dc_output),
            (EndpointKind::Solar, &solar),
        ];
        for (kind, legs) in power_legs {
            if units::any_leg(legs) {
                out.push(kind, attr::ACTIVE_POWER, units::to_milli(units::sum_legs(legs)));
            }
        }

        if let Some(flag) = p.show_flag {
            let flags = units::decode_show_flag(flag);
            out.push(EndpointKind::AcSwitch, attr::ON_OFF, flags.ac_on);
            out.push(EndpointKind::DcSwitch, attr::ON_OFF, flags.dc_on);
        }

        out.writes
    }

    /// Rule set of `cmdId` 2.
    pub fn project_backend(&self, device: &DeviceEndpoints, p: &Family2Params) -> Vec<AttributeWrite> {
        let mut out = Writes::new(device);

        if let Some(watts) = p.bms_input_watts {
            let state = if watts > 0.0 {
                ChargeState::IsCharging
            } else {
                ChargeState::IsNotCharging
            };
            out.push(EndpointKind::Battery, attr::BAT_CHARGE_STATE, state);
        }

        if let Some(watts) = p.bms_output_watts {
            let status = if watts > 0.0 {
                PowerSourceStatus::Active
            } else {
                PowerSourceStatus::Standby
            };
            out.push(EndpointKind::Battery, attr::STATUS, status);
        }

        if let (Some(a), Some(b)) = (p.in_ac5p8_amp, p.in_ac_c20_amp) {
            out.push(EndpointKind::AcInput, attr::ACTIVE_CURRENT, units::to_milli(a + b));
        }

        if let (Some(a), Some(b)) = (p.in_ac5p8_vol, p.in_ac_c20_vol) {
            let volts = units::select_voltage(a, b, self.settings.voltage_policy);
            out.push(EndpointKind::AcInput, attr::VOLTAGE, volts.map(units::to_milli));
        }

        out.writes
    }

    /// Issue every write. A failed write is logged and does not stop the rest.
    pub async fn apply<S: AttributeSink>(&self, sink: &S, writes: Vec<AttributeWrite>) -> WriteStats {
        let mut stats = WriteStats::default();

        for write in writes {
            match sink
                .set_attribute(&write.endpoint, write.attribute, write.value.clone())
                .await
            {
                Ok(()) => {
                    tracing::trace!(
                        endpoint = %write.endpoint,
                        attribute = %write.attribute,
                        value = %write.value,
                        "Attribute written"
                    );
                    stats.success += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %write.endpoint,
                        attribute = %write.attribute,
                        error = %e,
                        "Failed to write attribute"
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Device;
    use crate::schema::{Family3Params, validate};
    use serde_json::json;

    fn device(expose_solar: bool) -> DeviceEndpoints {
        DeviceEndpoints::standard(Device::new("DPU1", "DELTA Pro Ultra", "Home"), expose_solar)
    }

    fn family1(value: serde_json::Value) -> Family1Params {
        validate(Family1Params::SCHEMA, value).unwrap()
    }

    fn family2(value: serde_json::Value) -> Family2Params {
        validate(Family2Params::SCHEMA, value).unwrap()
    }

    fn int(v: i64) -> AttributeValue {
        AttributeValue::Integer(v)
    }

    fn summary(writes: &[AttributeWrite]) -> Vec<(String, String, AttributeValue)> {
        writes
            .iter()
            .map(|w| {
                (
                    w.endpoint.endpoint().to_string(),
                    w.attribute.to_string(),
                    w.value.clone(),
                )
            })
            .collect()
    }

    fn value_of(writes: &[AttributeWrite], endpoint: &str, attribute: AttributeId) -> Option<AttributeValue> {
        writes
            .iter()
            .find(|w| w.endpoint.endpoint() == endpoint && w.attribute == attribute)
            .map(|w| w.value.clone())
    }

    #[test]
    fn test_soc_percent_and_level() {
        let projector = Projector::default();
        let writes = projector.project_power_state(&device(false), &family1(json!({"soc": 55})));

        let expected: Vec<(String, String, AttributeValue)> = vec![
            ("Battery".into(), "powerSource.batPercentRemaining".into(), int(110)),
            ("Battery".into(), "powerSource.batChargeLevel".into(), "ok".into()),
        ];
        assert_eq!(summary(&writes), expected);
    }

    #[test]
    fn test_charge_level_threshold() {
        let dev = device(false);
        let default = Projector::default();
        let at = default.project_power_state(&dev, &family1(json!({"soc": 10})));
        assert_eq!(value_of(&at, "Battery", attr::BAT_CHARGE_LEVEL), Some("warning".into()));
        let above = default.project_power_state(&dev, &family1(json!({"soc": 11})));
        assert_eq!(value_of(&above, "Battery", attr::BAT_CHARGE_LEVEL), Some("ok".into()));

        let strict = Projector::new(ProjectionSettings {
            low_battery_threshold: 20,
            ..Default::default()
        });
        let writes = strict.project_power_state(&dev, &family1(json!({"soc": 15})));
        assert_eq!(value_of(&writes, "Battery", attr::BAT_CHARGE_LEVEL), Some("warning".into()));
    }

    #[test]
    fn test_time_remaining() {
        let projector = Projector::default();
        let dev = device(false);

        let idle = projector.project_power_state(&dev, &family1(json!({"remainTime": 100, "wattsInSum": 0})));
        assert_eq!(value_of(&idle, "Battery", attr::BAT_TIME_REMAINING), Some(int(6000)));

        let charging =
            projector.project_power_state(&dev, &family1(json!({"remainTime": 100, "wattsInSum": 5})));
        assert_eq!(
            value_of(&charging, "Battery", attr::BAT_TIME_REMAINING),
            Some(AttributeValue::Null)
        );

        let partial = projector.project_power_state(&dev, &family1(json!({"remainTime": 100})));
        assert!(partial.is_empty());
    }

    #[test]
    fn test_out_of_range_readings_skip_scaled_writes() {
        let projector = Projector::default();
        let dev = device(false);

        let soc = projector.project_power_state(&dev, &family1(json!({"soc": i64::MAX})));
        let expected: Vec<(String, String, AttributeValue)> = vec![(
            "Battery".into(),
            "powerSource.batChargeLevel".into(),
            "ok".into(),
        )];
        assert_eq!(summary(&soc), expected);

        let remain = projector.project_power_state(
            &dev,
            &family1(json!({"remainTime": i64::MAX, "wattsInSum": 0})),
        );
        assert!(remain.is_empty());

        let low = projector.project_power_state(&dev, &family1(json!({"soc": i64::MIN})));
        assert_eq!(value_of(&low, "Battery", attr::BAT_PERCENT_REMAINING), None);
        assert_eq!(value_of(&low, "Battery", attr::BAT_CHARGE_LEVEL), Some("warning".into()));
    }

    #[test]
    fn test_ac_input_single_leg() {
        let projector = Projector::default();
        let writes = projector.project_power_state(&device(false), &family1(json!({"inAc5p8Pwr": 100})));

        assert_eq!(value_of(&writes, "ACInput", attr::ACTIVE_POWER), Some(int(100_000)));
        assert_eq!(value_of(&writes, "Grid", attr::STATUS), Some("active".into()));
    }

    #[test]
    fn test_grid_standby_when_legs_zero() {
        let projector = Projector::default();
        let writes = projector.project_power_state(
            &device(false),
            &family1(json!({"inAc5p8Pwr": 0, "inAcC20Pwr": 0})),
        );
        assert_eq!(value_of(&writes, "Grid", attr::STATUS), Some("standby".into()));
        assert_eq!(value_of(&writes, "ACInput", attr::ACTIVE_POWER), Some(int(0)));
    }

    #[test]
    fn test_output_sums() {
        let projector = Projector::default();
        let writes = projector.project_power_state(
            &device(false),
            &family1(json!({
                "outAcL11Pwr": 100.5,
                "outAcL12Pwr": 50,
                "outUsb1Pwr": 5,
                "outTypec2Pwr": 20.25
            })),
        );

        assert_eq!(value_of(&writes, "ACOutput", attr::ACTIVE_POWER), Some(int(150_500)));
        assert_eq!(value_of(&writes, "DCOutput", attr::ACTIVE_POWER), Some(int(25_250)));
        assert_eq!(value_of(&writes, "ACInput", attr::ACTIVE_POWER), None);
    }

    #[test]
    fn test_solar_requires_endpoint() {
        let projector = Projector::default();
        let params = family1(json!({"inHvMpptPwr": 300, "inLvMpptPwr": 50}));

        assert!(projector.project_power_state(&device(false), &params).is_empty());
        let writes = projector.project_power_state(&device(true), &params);
        assert_eq!(value_of(&writes, "Solar", attr::ACTIVE_POWER), Some(int(350_000)));
    }

    #[test]
    fn test_show_flag() {
        let projector = Projector::default();
        let dev = device(false);

        let both = projector.project_power_state(&dev, &family1(json!({"showFlag": 6})));
        assert_eq!(value_of(&both, "ACSwitch", attr::ON_OFF), Some(true.into()));
        assert_eq!(value_of(&both, "DCSwitch", attr::ON_OFF), Some(true.into()));

        let none = projector.project_power_state(&dev, &family1(json!({"showFlag": 0})));
        assert_eq!(value_of(&none, "ACSwitch", attr::ON_OFF), Some(false.into()));
        assert_eq!(value_of(&none, "DCSwitch", attr::ON_OFF), Some(false.into()));
    }

    #[test]
    fn test_partial_payload_fires_remaining_rules() {
        let projector = Projector::default();
        // remainTime without wattsInSum: time rule skipped, soc rule still fires.
        let writes =
            projector.project_power_state(&device(false), &family1(json!({"soc": 40, "remainTime": 5})));

        assert_eq!(writes.len(), 2);
        assert_eq!(value_of(&writes, "Battery", attr::BAT_TIME_REMAINING), None);
        assert_eq!(value_of(&writes, "Battery", attr::BAT_PERCENT_REMAINING), Some(int(80)));
    }

    #[test]
    fn test_backend_battery_state() {
        let projector = Projector::default();
        let dev = device(false);

        let writes = projector.project_backend(
            &dev,
            &family2(json!({"bmsInputWatts": 200, "bmsOutputWatts": 0})),
        );
        let expected: Vec<(String, String, AttributeValue)> = vec![
            ("Battery".into(), "powerSource.batChargeState".into(), "isCharging".into()),
            ("Battery".into(), "powerSource.status".into(), "standby".into()),
        ];
        assert_eq!(summary(&writes), expected);

        let writes = projector.project_backend(&dev, &family2(json!({"bmsInputWatts": 0, "bmsOutputWatts": 9})));
        assert_eq!(value_of(&writes, "Battery", attr::BAT_CHARGE_STATE), Some("isNotCharging".into()));
        assert_eq!(value_of(&writes, "Battery", attr::STATUS), Some("active".into()));
    }

    #[test]
    fn test_backend_current_requires_both_legs() {
        let projector = Projector::default();
        let dev = device(false);

        let one = projector.project_backend(&dev, &family2(json!({"inAc5p8Amp": 3})));
        assert!(one.is_empty());

        let both = projector.project_backend(&dev, &family2(json!({"inAc5p8Amp": 3, "inAcC20Amp": 1.5})));
        assert_eq!(value_of(&both, "ACInput", attr::ACTIVE_CURRENT), Some(int(4_500)));
    }

    #[test]
    fn test_backend_voltage_policies() {
        let dev = device(false);
        let null_policy = Projector::default();
        let average_policy = Projector::new(ProjectionSettings {
            voltage_policy: VoltagePolicy::AverageIfBothPresent,
            ..Default::default()
        });

        let single = family2(json!({"inAc5p8Vol": 120, "inAcC20Vol": 0}));
        for projector in [null_policy, average_policy] {
            let writes = projector.project_backend(&dev, &single);
            assert_eq!(value_of(&writes, "ACInput", attr::VOLTAGE), Some(int(120_000)));
        }

        let both = family2(json!({"inAc5p8Vol": 120, "inAcC20Vol": 124}));
        let writes = null_policy.project_backend(&dev, &both);
        assert_eq!(value_of(&writes, "ACInput", attr::VOLTAGE), Some(AttributeValue::Null));
        let writes = average_policy.project_backend(&dev, &both);
        assert_eq!(value_of(&writes, "ACInput", attr::VOLTAGE), Some(int(122_000)));

        let missing = family2(json!({"inAc5p8Vol": 120}));
        assert!(null_policy.project_backend(&dev, &missing).is_empty());
    }

    #[test]
    fn test_set_info_projects_nothing() {
        let writes = Projector::default().project(
            &device(true),
            &FamilyParams::SetInfo(Family3Params::default()),
        );
        assert!(writes.is_empty());
    }

    #[test]
    fn test_missing_endpoint_skips_rule() {
        let battery_only = DeviceEndpoints::new(
            Device::new("DPU2", "DELTA Pro Ultra", "Shed"),
            [EndpointKind::Battery],
        );
        let writes = Projector::default()
            .project_power_state(&battery_only, &family1(json!({"soc": 50, "showFlag": 4})));

        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|w| w.endpoint.endpoint() == "Battery"));
    }
}
