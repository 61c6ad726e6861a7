//! Data models for charger-sync-gateway

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat field-name → value map as returned by a charger status query.
pub type StatusMap = HashMap<String, Value>;

// ============================================================================
// Exposed read surface
// ============================================================================

/// Field names reported per charger. The device reports more keys than
/// these; this is the set the read surface guarantees.
pub mod fields {
    pub const CAR_STATUS: &str = "car_status";
    pub const CHARGER_MAX_CURRENT: &str = "charger_max_current";
    pub const CHARGER_ABSOLUTE_MAX_CURRENT: &str = "charger_absolute_max_current";
    pub const CHARGER_ERR: &str = "charger_err";
    pub const CHARGER_ACCESS: &str = "charger_access";
    pub const STOP_MODE: &str = "stop_mode";
    pub const CABLE_LOCK_MODE: &str = "cable_lock_mode";
    pub const CABLE_MAX_CURRENT: &str = "cable_max_current";
    pub const PRE_CONTACTOR_L1: &str = "pre_contactor_l1";
    pub const PRE_CONTACTOR_L2: &str = "pre_contactor_l2";
    pub const PRE_CONTACTOR_L3: &str = "pre_contactor_l3";
    pub const POST_CONTACTOR_L1: &str = "post_contactor_l1";
    pub const POST_CONTACTOR_L2: &str = "post_contactor_l2";
    pub const POST_CONTACTOR_L3: &str = "post_contactor_l3";
    pub const CHARGER_TEMP: &str = "charger_temp";
    pub const CHARGER_TEMP0: &str = "charger_temp0";
    pub const CHARGER_TEMP1: &str = "charger_temp1";
    pub const CHARGER_TEMP2: &str = "charger_temp2";
    pub const CHARGER_TEMP3: &str = "charger_temp3";
    pub const CURRENT_SESSION_CHARGED_ENERGY: &str = "current_session_charged_energy";
    pub const CURRENT_SESSION_CHARGED_ENERGY_CORRECTED: &str =
        "current_session_charged_energy_corrected";
    pub const CHARGE_LIMIT: &str = "charge_limit";
    pub const ADAPTER: &str = "adapter";
    pub const UNLOCKED_BY_CARD: &str = "unlocked_by_card";
    pub const ENERGY_TOTAL: &str = "energy_total";
    pub const ENERGY_TOTAL_CORRECTED: &str = "energy_total_corrected";
    pub const WIFI: &str = "wifi";
    pub const ALLOW_CHARGING: &str = "allow_charging";

    pub const U_L1: &str = "u_l1";
    pub const U_L2: &str = "u_l2";
    pub const U_L3: &str = "u_l3";
    pub const U_N: &str = "u_n";
    pub const I_L1: &str = "i_l1";
    pub const I_L2: &str = "i_l2";
    pub const I_L3: &str = "i_l3";
    pub const P_L1: &str = "p_l1";
    pub const P_L2: &str = "p_l2";
    pub const P_L3: &str = "p_l3";
    pub const P_N: &str = "p_n";
    pub const P_ALL: &str = "p_all";
    pub const LF_L1: &str = "lf_l1";
    pub const LF_L2: &str = "lf_l2";
    pub const LF_L3: &str = "lf_l3";
    pub const LF_N: &str = "lf_n";

    pub const FIRMWARE: &str = "firmware";
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const WIFI_SSID: &str = "wifi_ssid";
    pub const WIFI_ENABLED: &str = "wifi_enabled";
    pub const TIMEZONE_OFFSET: &str = "timezone_offset";
    pub const TIMEZONE_DST_OFFSET: &str = "timezone_dst_offset";
}

/// Sentinel value the device reports in `car_status` while a reading is
/// still incomplete.
pub const CAR_STATUS_UNKNOWN: &str = "unknown";

/// A status response is usable only once its primary field has settled.
pub fn status_is_complete(status: &StatusMap) -> bool {
    match status.get(fields::CAR_STATUS) {
        Some(Value::String(s)) => s != CAR_STATUS_UNKNOWN,
        Some(_) => true,
        None => false,
    }
}

// ============================================================================
// Charger State
// ============================================================================

/// Last accepted status snapshot for one charger, including the derived
/// corrected-energy fields.
#[derive(Debug, Clone, Serialize)]
pub struct ChargerState {
    pub fields: StatusMap,
    pub updated_at: DateTime<Utc>,
}

impl ChargerState {
    /// Build a state entry from an accepted status response. The corrected
    /// energy fields are always recomputed here from the raw fields, never
    /// carried over from a previous snapshot.
    pub fn from_status(status: StatusMap, correction_factor: f64) -> Self {
        let mut fields_map = status;

        if let Some(total) = numeric(fields_map.get(fields::ENERGY_TOTAL)) {
            fields_map.insert(
                fields::ENERGY_TOTAL_CORRECTED.to_string(),
                json_number(total * correction_factor),
            );
        }
        if let Some(session) = numeric(fields_map.get(fields::CURRENT_SESSION_CHARGED_ENERGY)) {
            fields_map.insert(
                fields::CURRENT_SESSION_CHARGED_ENERGY_CORRECTED.to_string(),
                json_number(session * correction_factor),
            );
        }

        Self {
            fields: fields_map,
            updated_at: Utc::now(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn car_status(&self) -> Option<&str> {
        self.fields.get(fields::CAR_STATUS).and_then(Value::as_str)
    }

    pub fn energy_total(&self) -> Option<f64> {
        numeric(self.fields.get(fields::ENERGY_TOTAL))
    }

    pub fn energy_total_corrected(&self) -> Option<f64> {
        numeric(self.fields.get(fields::ENERGY_TOTAL_CORRECTED))
    }

    pub fn current_session_charged_energy(&self) -> Option<f64> {
        numeric(self.fields.get(fields::CURRENT_SESSION_CHARGED_ENERGY))
    }

    pub fn current_session_charged_energy_corrected(&self) -> Option<f64> {
        numeric(
            self.fields
                .get(fields::CURRENT_SESSION_CHARGED_ENERGY_CORRECTED),
        )
    }

    /// The device reports the charging-allowed toggle as `"on"` / `"off"`.
    pub fn charging_allowed(&self) -> bool {
        matches!(
            self.fields.get(fields::ALLOW_CHARGING),
            Some(Value::String(s)) if s == "on"
        )
    }
}

/// Numeric view of a status value; the device mixes JSON numbers and
/// numeric strings across firmware versions.
fn numeric(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

// ============================================================================
// Control attributes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAttribute {
    #[serde(rename = "max_current")]
    MaxCurrent,
    #[serde(rename = "charger_absolute_max_current")]
    AbsoluteMaxCurrent,
    #[serde(rename = "cable_lock_mode")]
    CableLockMode,
    #[serde(rename = "charge_limit")]
    ChargeLimit,
    #[serde(rename = "allow_charging")]
    AllowCharging,
}

impl std::fmt::Display for ControlAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAttribute::MaxCurrent => write!(f, "max_current"),
            ControlAttribute::AbsoluteMaxCurrent => write!(f, "charger_absolute_max_current"),
            ControlAttribute::CableLockMode => write!(f, "cable_lock_mode"),
            ControlAttribute::ChargeLimit => write!(f, "charge_limit"),
            ControlAttribute::AllowCharging => write!(f, "allow_charging"),
        }
    }
}

/// Cable lock behavior as understood by the charger firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CableLockMode {
    #[serde(rename = "unlock_car_first")]
    UnlockCarFirst,
    #[serde(rename = "automatic")]
    Automatic,
    #[serde(rename = "locked")]
    Locked,
}

impl CableLockMode {
    /// Coerce a raw numeric payload: 1 is automatic, 2 and above is locked,
    /// everything else falls back to unlock-car-first.
    pub fn from_raw(raw: f64) -> Self {
        if raw >= 2.0 {
            CableLockMode::Locked
        } else if raw >= 1.0 {
            CableLockMode::Automatic
        } else {
            CableLockMode::UnlockCarFirst
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CableLockMode::UnlockCarFirst => 0,
            CableLockMode::Automatic => 1,
            CableLockMode::Locked => 2,
        }
    }
}

impl std::fmt::Display for CableLockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CableLockMode::UnlockCarFirst => write!(f, "unlock_car_first"),
            CableLockMode::Automatic => write!(f, "automatic"),
            CableLockMode::Locked => write!(f, "locked"),
        }
    }
}

// ============================================================================
// Command requests
// ============================================================================

/// A control argument is either a number or a reference to a live value
/// readable through the host (e.g. another entity's current reading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandValue {
    Literal(f64),
    Reference(String),
}

impl CommandValue {
    /// Classify a raw string payload. Numeric strings become literals,
    /// anything else is treated as a host reference.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) => CommandValue::Literal(n),
            Err(_) => CommandValue::Reference(raw.to_string()),
        }
    }
}

impl From<f64> for CommandValue {
    fn from(n: f64) -> Self {
        CommandValue::Literal(n)
    }
}

impl From<bool> for CommandValue {
    fn from(b: bool) -> Self {
        CommandValue::Literal(if b { 1.0 } else { 0.0 })
    }
}

/// An inbound control request before normalization. `charger: None`
/// broadcasts to every registered charger.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub charger: Option<String>,
    pub attribute: ControlAttribute,
    pub value: CommandValue,
}

impl CommandRequest {
    pub fn new(
        charger: Option<String>,
        attribute: ControlAttribute,
        value: impl Into<CommandValue>,
    ) -> Self {
        Self {
            charger,
            attribute,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_completeness() {
        let mut status = StatusMap::new();
        assert!(!status_is_complete(&status));

        status.insert(fields::CAR_STATUS.into(), json!("unknown"));
        assert!(!status_is_complete(&status));

        status.insert(fields::CAR_STATUS.into(), json!("Charging"));
        assert!(status_is_complete(&status));
    }

    #[test]
    fn test_corrected_fields_recomputed() {
        let mut status = StatusMap::new();
        status.insert(fields::CAR_STATUS.into(), json!("Charging"));
        status.insert(fields::ENERGY_TOTAL.into(), json!(100.0));
        status.insert(fields::CURRENT_SESSION_CHARGED_ENERGY.into(), json!(4.0));
        // A stale derived value in the raw response must be overwritten.
        status.insert(fields::ENERGY_TOTAL_CORRECTED.into(), json!(1.0));

        let state = ChargerState::from_status(status, 1.5);
        assert_eq!(state.energy_total_corrected(), Some(150.0));
        assert_eq!(state.current_session_charged_energy_corrected(), Some(6.0));
    }

    #[test]
    fn test_numeric_string_fields() {
        let mut status = StatusMap::new();
        status.insert(fields::CAR_STATUS.into(), json!("Car is charging"));
        status.insert(fields::ENERGY_TOTAL.into(), json!("42.5"));

        let state = ChargerState::from_status(status, 2.0);
        assert_eq!(state.energy_total(), Some(42.5));
        assert_eq!(state.energy_total_corrected(), Some(85.0));
    }

    #[test]
    fn test_charging_allowed_mapping() {
        let mut status = StatusMap::new();
        status.insert(fields::CAR_STATUS.into(), json!("Charger ready"));
        status.insert(fields::ALLOW_CHARGING.into(), json!("on"));
        let state = ChargerState::from_status(status.clone(), 1.0);
        assert!(state.charging_allowed());

        status.insert(fields::ALLOW_CHARGING.into(), json!("off"));
        let state = ChargerState::from_status(status, 1.0);
        assert!(!state.charging_allowed());
    }

    #[test]
    fn test_cable_lock_mode_coercion() {
        assert_eq!(CableLockMode::from_raw(0.0), CableLockMode::UnlockCarFirst);
        assert_eq!(CableLockMode::from_raw(-3.0), CableLockMode::UnlockCarFirst);
        assert_eq!(CableLockMode::from_raw(1.0), CableLockMode::Automatic);
        assert_eq!(CableLockMode::from_raw(2.0), CableLockMode::Locked);
        assert_eq!(CableLockMode::from_raw(7.0), CableLockMode::Locked);
    }

    #[test]
    fn test_command_value_parse() {
        assert_eq!(CommandValue::parse("16"), CommandValue::Literal(16.0));
        assert_eq!(CommandValue::parse(" 7.5 "), CommandValue::Literal(7.5));
        assert_eq!(
            CommandValue::parse("sensor.pv_surplus"),
            CommandValue::Reference("sensor.pv_surplus".into())
        );
    }
}
