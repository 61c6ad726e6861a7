//! Command dispatcher
//!
//! Validates and normalizes inbound control requests, fans them out to the
//! targeted chargers best-effort, then triggers one aggregate refresh so
//! reads after the command observe the new device state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::ChargerRegistry;
use crate::error::SyncError;
use crate::models::{CableLockMode, CommandRequest, CommandValue, ControlAttribute};
use crate::poller::StatePoller;

pub const MIN_CURRENT_AMPS: u8 = 6;
pub const MAX_CURRENT_AMPS: u8 = 32;

/// Read interface into the host for reference-valued command arguments
/// (e.g. "take the value of that other sensor").
#[async_trait]
pub trait ValueResolver: Send + Sync {
    /// Resolve a reference to a number, or `None` if the reference does not
    /// exist or does not carry a numeric value right now.
    async fn resolve(&self, reference: &str) -> Option<f64>;
}

/// Resolver for hosts without a readable value surface; every reference
/// fails to resolve.
pub struct NoExternalValues;

#[async_trait]
impl ValueResolver for NoExternalValues {
    async fn resolve(&self, _reference: &str) -> Option<f64> {
        None
    }
}

/// A normalized setter payload, clamped to the attribute's valid range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetterPayload {
    MaxCurrent(u8),
    AbsoluteMaxCurrent(u8),
    CableLockMode(CableLockMode),
    ChargeLimit(f64),
    AllowCharging(bool),
}

impl SetterPayload {
    /// Clamp a resolved numeric value into the attribute's range.
    pub fn normalize(attribute: ControlAttribute, raw: f64) -> Self {
        match attribute {
            ControlAttribute::MaxCurrent => SetterPayload::MaxCurrent(clamp_amps(raw)),
            ControlAttribute::AbsoluteMaxCurrent => {
                SetterPayload::AbsoluteMaxCurrent(clamp_amps(raw))
            }
            ControlAttribute::CableLockMode => {
                SetterPayload::CableLockMode(CableLockMode::from_raw(raw))
            }
            ControlAttribute::ChargeLimit => SetterPayload::ChargeLimit(raw.max(0.0)),
            ControlAttribute::AllowCharging => SetterPayload::AllowCharging(raw != 0.0),
        }
    }
}

fn clamp_amps(raw: f64) -> u8 {
    raw.round().clamp(MIN_CURRENT_AMPS as f64, MAX_CURRENT_AMPS as f64) as u8
}

/// Per-target result of a best-effort broadcast.
#[derive(Debug)]
pub struct TargetOutcome {
    pub charger: String,
    pub result: Result<(), SyncError>,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Normalizes control requests and forwards them to the device clients.
/// Never writes the state table itself; state flows back in through the
/// refresh it triggers afterwards.
pub struct CommandDispatcher {
    registry: ChargerRegistry,
    resolver: Arc<dyn ValueResolver>,
    poller: Arc<StatePoller>,
}

impl CommandDispatcher {
    pub fn new(
        registry: ChargerRegistry,
        resolver: Arc<dyn ValueResolver>,
        poller: Arc<StatePoller>,
    ) -> Self {
        Self {
            registry,
            resolver,
            poller,
        }
    }

    /// Run the full pipeline: resolve, clamp, fan out, refresh. Aborts with
    /// `InvalidValue` before any device call if the argument cannot be
    /// turned into a number; individual target failures are collected, not
    /// propagated.
    pub async fn dispatch(&self, request: CommandRequest) -> Result<Vec<TargetOutcome>, SyncError> {
        let raw = self.resolve_value(&request).await?;
        let payload = SetterPayload::normalize(request.attribute, raw);

        let targets = match request.charger.as_deref() {
            Some(name) if !name.is_empty() => vec![name.to_string()],
            _ => self.registry.names().await,
        };

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.apply_one(&target, payload).await;
            if let Err(e) = &result {
                tracing::error!("{}", e);
            } else {
                tracing::debug!(
                    "set {} for charger '{}' to {:?}",
                    request.attribute,
                    target,
                    payload
                );
            }
            outcomes.push(TargetOutcome {
                charger: target,
                result,
            });
        }

        // Read-after-write: one aggregate refresh once every target call
        // has completed, successful or not.
        self.poller.refresh_all().await;

        Ok(outcomes)
    }

    pub async fn set_max_current(
        &self,
        charger: Option<String>,
        value: CommandValue,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        self.dispatch(CommandRequest::new(charger, ControlAttribute::MaxCurrent, value))
            .await
    }

    pub async fn set_absolute_max_current(
        &self,
        charger: Option<String>,
        value: CommandValue,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        self.dispatch(CommandRequest::new(
            charger,
            ControlAttribute::AbsoluteMaxCurrent,
            value,
        ))
        .await
    }

    pub async fn set_cable_lock_mode(
        &self,
        charger: Option<String>,
        value: CommandValue,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        self.dispatch(CommandRequest::new(
            charger,
            ControlAttribute::CableLockMode,
            value,
        ))
        .await
    }

    pub async fn set_charge_limit(
        &self,
        charger: Option<String>,
        value: CommandValue,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        self.dispatch(CommandRequest::new(charger, ControlAttribute::ChargeLimit, value))
            .await
    }

    /// Switch-entity path: same pipeline, boolean payload.
    pub async fn set_allow_charging(
        &self,
        charger: Option<String>,
        allow: bool,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        self.dispatch(CommandRequest::new(
            charger,
            ControlAttribute::AllowCharging,
            allow,
        ))
        .await
    }

    async fn resolve_value(&self, request: &CommandRequest) -> Result<f64, SyncError> {
        let resolved = match &request.value {
            CommandValue::Literal(n) => Some(*n),
            CommandValue::Reference(reference) => self.resolver.resolve(reference).await,
        };
        match resolved {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(SyncError::InvalidValue {
                attribute: request.attribute.to_string(),
                given: match &request.value {
                    CommandValue::Literal(n) => n.to_string(),
                    CommandValue::Reference(reference) => reference.clone(),
                },
            }),
        }
    }

    async fn apply_one(&self, target: &str, payload: SetterPayload) -> Result<(), SyncError> {
        let charger = self
            .registry
            .get(target)
            .await
            .ok_or_else(|| SyncError::UnknownTarget(target.to_string()))?;

        match payload {
            SetterPayload::MaxCurrent(amps) => charger.client.set_max_current(amps).await,
            SetterPayload::AbsoluteMaxCurrent(amps) => {
                charger.client.set_absolute_max_current(amps).await
            }
            SetterPayload::CableLockMode(mode) => charger.client.set_cable_lock_mode(mode).await,
            SetterPayload::ChargeLimit(kwh) => charger.client.set_charge_limit(kwh).await,
            SetterPayload::AllowCharging(allow) => charger.client.set_allow_charging(allow).await,
        }
    }
}
