//! Test doubles shared across module tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::client::ChargerClient;
use crate::dispatch::ValueResolver;
use crate::error::SyncError;
use crate::models::{fields, CableLockMode, StatusMap};

/// Opt a test run into log output, honoring `RUST_LOG`. Safe to call from
/// every test; only the first caller installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A representative full status response for one charger.
pub fn sample_status(serial: &str) -> StatusMap {
    let mut status = StatusMap::new();
    status.insert(fields::CAR_STATUS.into(), json!("Charger ready"));
    status.insert(fields::CHARGER_MAX_CURRENT.into(), json!(16));
    status.insert(fields::CHARGER_ABSOLUTE_MAX_CURRENT.into(), json!(32));
    status.insert(fields::CABLE_LOCK_MODE.into(), json!(0));
    status.insert(fields::CABLE_MAX_CURRENT.into(), json!(20));
    status.insert(fields::CHARGER_TEMP.into(), json!(24));
    status.insert(fields::ENERGY_TOTAL.into(), json!(100.0));
    status.insert(fields::CURRENT_SESSION_CHARGED_ENERGY.into(), json!(4.0));
    status.insert(fields::CHARGE_LIMIT.into(), json!(0.0));
    status.insert(fields::ALLOW_CHARGING.into(), json!("on"));
    status.insert(fields::U_L1.into(), json!(231));
    status.insert(fields::U_L2.into(), json!(232));
    status.insert(fields::U_L3.into(), json!(230));
    status.insert(fields::I_L1.into(), json!(10.2));
    status.insert(fields::P_ALL.into(), json!(7.1));
    status.insert(fields::FIRMWARE.into(), json!("040"));
    status.insert(fields::SERIAL_NUMBER.into(), json!(serial));
    status.insert(fields::WIFI_SSID.into(), json!("home-iot"));
    status
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetterCall {
    MaxCurrent(u8),
    AbsoluteMaxCurrent(u8),
    CableLockMode(CableLockMode),
    ChargeLimit(f64),
    AllowCharging(bool),
}

enum DefaultStatus {
    Healthy(StatusMap),
    Offline,
}

/// Scripted device client: serves queued status responses first, then a
/// fixed default, and records every setter call.
pub struct MockCharger {
    default: DefaultStatus,
    scripted: Mutex<VecDeque<Result<StatusMap, SyncError>>>,
    calls: Mutex<Vec<SetterCall>>,
    requests: Mutex<usize>,
    setters_fail: Mutex<bool>,
}

impl MockCharger {
    pub fn healthy(serial: &str) -> Self {
        Self {
            default: DefaultStatus::Healthy(sample_status(serial)),
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(0),
            setters_fail: Mutex::new(false),
        }
    }

    pub fn offline() -> Self {
        Self {
            default: DefaultStatus::Offline,
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(0),
            setters_fail: Mutex::new(false),
        }
    }

    /// Queue the next status response ahead of the default.
    pub fn push_status(&self, response: Result<StatusMap, SyncError>) {
        self.scripted.lock().unwrap().push_back(response);
    }

    pub fn fail_setters(&self) {
        *self.setters_fail.lock().unwrap() = true;
    }

    pub fn setter_calls(&self) -> Vec<SetterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }

    fn record(&self, call: SetterCall) -> Result<(), SyncError> {
        if *self.setters_fail.lock().unwrap() {
            return Err(SyncError::Transport("setter rejected".into()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl ChargerClient for MockCharger {
    async fn request_status(&self) -> Result<StatusMap, SyncError> {
        *self.requests.lock().unwrap() += 1;
        if let Some(scripted) = self.scripted.lock().unwrap().pop_front() {
            return scripted;
        }
        match &self.default {
            DefaultStatus::Healthy(status) => Ok(status.clone()),
            DefaultStatus::Offline => Err(SyncError::Transport("connection refused".into())),
        }
    }

    async fn set_max_current(&self, amps: u8) -> Result<(), SyncError> {
        self.record(SetterCall::MaxCurrent(amps))
    }

    async fn set_absolute_max_current(&self, amps: u8) -> Result<(), SyncError> {
        self.record(SetterCall::AbsoluteMaxCurrent(amps))
    }

    async fn set_cable_lock_mode(&self, mode: CableLockMode) -> Result<(), SyncError> {
        self.record(SetterCall::CableLockMode(mode))
    }

    async fn set_charge_limit(&self, kwh: f64) -> Result<(), SyncError> {
        self.record(SetterCall::ChargeLimit(kwh))
    }

    async fn set_allow_charging(&self, allow: bool) -> Result<(), SyncError> {
        self.record(SetterCall::AllowCharging(allow))
    }
}

/// Resolver backed by a fixed reference → value map.
pub struct MockResolver {
    values: HashMap<String, f64>,
}

impl MockResolver {
    pub fn with_value(reference: &str, value: f64) -> Self {
        let mut values = HashMap::new();
        values.insert(reference.to_string(), value);
        Self { values }
    }
}

#[async_trait]
impl ValueResolver for MockResolver {
    async fn resolve(&self, reference: &str) -> Option<f64> {
        self.values.get(reference).copied()
    }
}
