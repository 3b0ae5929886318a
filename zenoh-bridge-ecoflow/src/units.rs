//! Unit conversion and leg combination.

use serde::{Deserialize, Serialize};

/// `showFlag` bit reporting the AC outputs as enabled.
pub const SHOW_FLAG_AC: i64 = 0x04;
/// `showFlag` bit reporting the DC outputs as enabled.
pub const SHOW_FLAG_DC: i64 = 0x02;

/// Convert a base-unit reading to milli-units, rounded to the nearest integer.
pub fn to_milli(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// Sum of the legs that are present; absent legs count as zero.
pub fn sum_legs(legs: &[Option<f64>]) -> f64 {
    legs.iter().flatten().sum()
}

/// Whether at least one leg is present.
pub fn any_leg(legs: &[Option<f64>]) -> bool {
    legs.iter().any(Option::is_some)
}

/// How two energized voltage legs resolve to one reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltagePolicy {
    /// Mean of both legs.
    AverageIfBothPresent,
    /// Ambiguous dual-energized input; no value.
    #[default]
    NullIfBothPresent,
}

/// Pick one voltage from two legs.
///
/// A single leg above zero wins. With neither above zero the reading is zero.
/// `None` means "explicitly no value".
pub fn select_voltage(a: f64, b: f64, policy: VoltagePolicy) -> Option<f64> {
    match (a > 0.0, b > 0.0) {
        (true, true) => match policy {
            VoltagePolicy::AverageIfBothPresent => Some((a + b) / 2.0),
            VoltagePolicy::NullIfBothPresent => None,
        },
        (true, false) => Some(a),
        (false, true) => Some(b),
        (false, false) => Some(0.0),
    }
}

/// Switch states decoded from `showFlag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowFlags {
    pub ac_on: bool,
    pub dc_on: bool,
}

/// Decode the switch bits of `showFlag`; other bits are ignored.
pub fn decode_show_flag(flag: i64) -> ShowFlags {
    ShowFlags {
        ac_on: flag & SHOW_FLAG_AC != 0,
        dc_on: flag & SHOW_FLAG_DC != 0,
    }
}
