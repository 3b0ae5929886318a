//! Shape validation for inbound payloads.
//!
//! Every declared parameter field is optional. Present fields must carry the
//! declared type; undeclared fields land in `extra` and are never a reason
//! for rejection. Integer fields accept integral floats such as `40.0` and
//! reject fractional numbers.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::SchemaError;

/// Address tag of the live power/state subsystem.
pub const ADDR_APP_SHOW: &str = "hs_yj751_pd_appshow_addr";
/// Address tag of the BMS/backend subsystem.
pub const ADDR_BACKEND: &str = "hs_yj751_pd_backend_addr";
/// Address tag of the settings echo subsystem.
pub const ADDR_APP_SET_INFO: &str = "hs_yj751_pd_app_set_info_addr";

/// Validate a decoded JSON value against `T`, reporting the failing field path.
pub fn validate<T: DeserializeOwned>(schema: &'static str, value: Value) -> Result<T, SchemaError> {
    serde_path_to_error::deserialize(value).map_err(|e| schema_error(schema, e))
}

/// Validate raw JSON bytes against `T`.
pub fn validate_slice<T: DeserializeOwned>(
    schema: &'static str,
    bytes: &[u8],
) -> Result<T, SchemaError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(|e| schema_error(schema, e))
}

fn schema_error(
    schema: &'static str,
    e: serde_path_to_error::Error<serde_json::Error>,
) -> SchemaError {
    SchemaError {
        schema,
        path: e.path().to_string(),
        message: e.inner().to_string(),
    }
}

/// Integer fields that also accept integral floats.
mod integral {
    use std::fmt;

    use serde::de::{self, Deserialize, Deserializer, Unexpected, Visitor};

    // 2^63 as f64; the i64 range is [-2^63, 2^63).
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    struct Integral(i64);

    struct IntegralVisitor;

    impl Visitor<'_> for IntegralVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            if v.is_finite() && v.fract() == 0.0 && (-LIMIT..LIMIT).contains(&v) {
                Ok(v as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }
    }

    impl<'de> Deserialize<'de> for Integral {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(IntegralVisitor).map(Integral)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Integral::deserialize(deserializer).map(|i| i.0)
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Integral>::deserialize(deserializer).map(|i| i.map(|i| i.0))
    }
}

/// One inbound telemetry message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(deserialize_with = "integral::deserialize")]
    pub cmd_id: i64,
    #[serde(deserialize_with = "integral::deserialize")]
    pub cmd_func: i64,
    pub addr: String,
    pub param: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub const SCHEMA: &'static str = "envelope";

    /// Validate raw message bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, SchemaError> {
        validate_slice(Self::SCHEMA, bytes)
    }

    /// The parameter map as a JSON object (empty when absent).
    pub fn params(&self) -> Value {
        Value::Object(self.param.clone().unwrap_or_default())
    }
}

/// Best-effort `cmdId` extraction for logging a rejected envelope.
pub fn peek_cmd_id(bytes: &[u8]) -> Option<i64> {
    let value = serde_json::from_slice::<Value>(bytes).ok()?;
    integral::deserialize(value.get("cmdId")?).ok()
}

/// `cmdId` 1: power and state readings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family1Params {
    #[serde(default, deserialize_with = "integral::option")]
    pub access5p8_in_type: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub access5p8_out_type: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub bp_num: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub c20_chg_max_watts: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_mode: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_param: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_table0: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_table1: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_table2: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_time_task_type: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_mode: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_notice: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_table0: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_table1: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_table2: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_time_task_type: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub full_combo: Option<i64>,
    pub in_ac5p8_pwr: Option<f64>,
    pub in_ac_c20_pwr: Option<f64>,
    pub in_hv_mppt_pwr: Option<f64>,
    pub in_lv_mppt_pwr: Option<f64>,
    pub out_ac5p8_pwr: Option<f64>,
    pub out_ac_l11_pwr: Option<f64>,
    pub out_ac_l12_pwr: Option<f64>,
    pub out_ac_l14_pwr: Option<f64>,
    pub out_ac_l21_pwr: Option<f64>,
    pub out_ac_l22_pwr: Option<f64>,
    pub out_ac_tt_pwr: Option<f64>,
    pub out_ads_pwr: Option<f64>,
    pub out_pr_pwr: Option<f64>,
    pub out_typec1_pwr: Option<f64>,
    pub out_typec2_pwr: Option<f64>,
    pub out_usb1_pwr: Option<f64>,
    pub out_usb2_pwr: Option<f64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub para_chg_max_watts: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub remain_combo: Option<i64>,
    /// Minutes.
    #[serde(default, deserialize_with = "integral::option")]
    pub remain_time: Option<i64>,
    /// Half-scale state of charge.
    #[serde(default, deserialize_with = "integral::option")]
    pub soc: Option<i64>,
    /// Bitmask; see [`crate::units::decode_show_flag`].
    #[serde(default, deserialize_with = "integral::option")]
    pub show_flag: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub sys_err_code: Option<i64>,
    pub watts_in_sum: Option<f64>,
    pub watts_out_sum: Option<f64>,
    #[serde(rename = "wirlesss4gErrCode")]
    #[serde(default, deserialize_with = "integral::option")]
    pub wireless4g_err_code: Option<i64>,
    #[serde(rename = "wireless4GSta")]
    #[serde(default, deserialize_with = "integral::option")]
    pub wireless4g_sta: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub wireless4g_con: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub wireless4g_on: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Family1Params {
    pub const SCHEMA: &'static str = "cmdId 1 params";

    /// AC input legs.
    pub fn ac_input_legs(&self) -> [Option<f64>; 2] {
        [self.in_ac5p8_pwr, self.in_ac_c20_pwr]
    }

    /// AC output legs.
    pub fn ac_output_legs(&self) -> [Option<f64>; 7] {
        [
            self.out_ac5p8_pwr,
            self.out_ac_l11_pwr,
            self.out_ac_l12_pwr,
            self.out_ac_l14_pwr,
            self.out_ac_l21_pwr,
            self.out_ac_l22_pwr,
            self.out_ac_tt_pwr,
        ]
    }

    /// DC output legs.
    pub fn dc_output_legs(&self) -> [Option<f64>; 5] {
        [
            self.out_ads_pwr,
            self.out_typec1_pwr,
            self.out_typec2_pwr,
            self.out_usb1_pwr,
            self.out_usb2_pwr,
        ]
    }

    /// High- and low-voltage MPPT legs.
    pub fn solar_legs(&self) -> [Option<f64>; 2] {
        [self.in_hv_mppt_pwr, self.in_lv_mppt_pwr]
    }
}

/// `cmdId` 2: BMS, voltage and current readings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family2Params {
    #[serde(default, deserialize_with = "integral::option")]
    pub ac_out_freq: Option<i64>,
    pub bms_input_watts: Option<f64>,
    pub bms_output_watts: Option<f64>,
    pub in_ac5p8_amp: Option<f64>,
    pub in_ac_c20_amp: Option<f64>,
    pub in_ac5p8_vol: Option<f64>,
    pub in_ac_c20_vol: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Family2Params {
    pub const SCHEMA: &'static str = "cmdId 2 params";
}

/// `cmdId` 3: settings echo. Observed only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family3Params {
    #[serde(default, deserialize_with = "integral::option")]
    pub ac_often_open_flg: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub ac_often_open_min_soc: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub ac_out_freq: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub ac_standby_mins: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub backup_ratio: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub bms_mode_set: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg5p8_set_watts: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_c20_set_watts: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub chg_max_soc: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dc_standby_mins: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub dsg_min_soc: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub energy_mamage_enable: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub power_standby_mins: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub screen_standby_sec: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub sys_backup_soc: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub sys_timezone: Option<i64>,
    pub sys_timezone_id: Option<String>,
    #[serde(default, deserialize_with = "integral::option")]
    pub sys_word_mode: Option<i64>,
    #[serde(default, deserialize_with = "integral::option")]
    pub timezone_settype: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Family3Params {
    pub const SCHEMA: &'static str = "cmdId 3 params";
}

/// Command family a parameter group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    PowerState,
    Backend,
    SetInfo,
}

impl Family {
    /// Family selected by an envelope `cmdId`.
    pub fn from_cmd_id(cmd_id: i64) -> Option<Self> {
        match cmd_id {
            1 => Some(Family::PowerState),
            2 => Some(Family::Backend),
            3 => Some(Family::SetInfo),
            _ => None,
        }
    }

    /// Family whose fields a baseline address prefix carries.
    pub fn from_addr(addr: &str) -> Option<Self> {
        match addr {
            ADDR_APP_SHOW => Some(Family::PowerState),
            ADDR_BACKEND => Some(Family::Backend),
            ADDR_APP_SET_INFO => Some(Family::SetInfo),
            _ => None,
        }
    }

    pub fn cmd_id(&self) -> i64 {
        match self {
            Family::PowerState => 1,
            Family::Backend => 2,
            Family::SetInfo => 3,
        }
    }
}

/// Validated parameters of one family.
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyParams {
    PowerState(Box<Family1Params>),
    Backend(Family2Params),
    SetInfo(Family3Params),
}

impl FamilyParams {
    /// Validate `params` with the schema of `family`.
    pub fn validate(family: Family, params: Value) -> Result<Self, SchemaError> {
        Ok(match family {
            Family::PowerState => {
                FamilyParams::PowerState(Box::new(validate(Family1Params::SCHEMA, params)?))
            }
            Family::Backend => FamilyParams::Backend(validate(Family2Params::SCHEMA, params)?),
            Family::SetInfo => FamilyParams::SetInfo(validate(Family3Params::SCHEMA, params)?),
        })
    }
}

/// The REST one-shot property map: `"<addr>.<field>"` to a numeric value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineSnapshot(pub BTreeMap<String, Number>);

impl BaselineSnapshot {
    pub const SCHEMA: &'static str = "baseline snapshot";

    /// Validate the `data` object of a quota response.
    ///
    /// The object itself is required. Entries whose value is not a number
    /// are skipped.
    pub fn parse(value: Value) -> Result<Self, SchemaError> {
        let entries: BTreeMap<String, Value> = validate(Self::SCHEMA, value)?;
        let mut numeric = BTreeMap::new();
        for (key, value) in entries {
            match value {
                Value::Number(n) => {
                    numeric.insert(key, n);
                }
                other => {
                    tracing::debug!(key = %key, value = %other, "Skipping non-numeric baseline property");
                }
            }
        }
        Ok(Self(numeric))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields grouped by address prefix.
    ///
    /// Keys without a `.` are dropped. The field part keeps any further dots.
    pub fn groups(&self) -> BTreeMap<&str, Value> {
        let mut groups: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
        for (key, value) in &self.0 {
            if let Some((addr, field)) = key.split_once('.') {
                groups
                    .entry(addr)
                    .or_default()
                    .insert(field.to_string(), Value::Number(value.clone()));
            }
        }
        groups
            .into_iter()
            .map(|(addr, fields)| (addr, Value::Object(fields)))
            .collect()
    }
}

/// Body of a `/status` topic message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusMessage {
    pub params: StatusParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusParams {
    /// 1 online, 0 offline.
    #[serde(deserialize_with = "integral::deserialize")]
    pub status: i64,
}

impl StatusMessage {
    pub const SCHEMA: &'static str = "status message";

    pub fn parse(bytes: &[u8]) -> Result<Self, SchemaError> {
        validate_slice(Self::SCHEMA, bytes)
    }

    pub fn online(&self) -> bool {
        self.params.status == 1
    }
}
