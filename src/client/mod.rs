//! Device client interface and charger registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::ChargerRegistration;
use crate::error::SyncError;
use crate::models::{fields, CableLockMode, StatusMap};

/// Narrow interface to one charger. Implementations own the wire protocol
/// and whatever timeout policy applies; this crate never talks to the
/// network directly.
#[async_trait]
pub trait ChargerClient: Send + Sync {
    /// Query the charger's full status map.
    async fn request_status(&self) -> Result<StatusMap, SyncError>;

    async fn set_max_current(&self, amps: u8) -> Result<(), SyncError>;

    async fn set_absolute_max_current(&self, amps: u8) -> Result<(), SyncError>;

    async fn set_cable_lock_mode(&self, mode: CableLockMode) -> Result<(), SyncError>;

    async fn set_charge_limit(&self, kwh: f64) -> Result<(), SyncError>;

    async fn set_allow_charging(&self, allow: bool) -> Result<(), SyncError>;
}

/// A registered charger: its configuration plus the client used to reach it.
#[derive(Clone)]
pub struct RegisteredCharger {
    pub registration: ChargerRegistration,
    pub client: Arc<dyn ChargerClient>,
}

impl RegisteredCharger {
    pub fn name(&self) -> &str {
        self.registration.name.as_deref().unwrap_or_default()
    }

    pub fn correction_factor(&self) -> f64 {
        self.registration.correction_factor
    }
}

impl std::fmt::Debug for RegisteredCharger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCharger")
            .field("registration", &self.registration)
            .finish()
    }
}

/// Charger name → registered charger. Registrations come and go with host
/// config entries; poll cycles and dispatches work on point-in-time
/// snapshots, so a teardown mid-cycle lets in-flight requests finish and
/// simply drops them from the next cycle.
#[derive(Clone, Default)]
pub struct ChargerRegistry {
    inner: Arc<RwLock<HashMap<String, RegisteredCharger>>>,
}

impl ChargerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named charger. The name is the unique key; a duplicate
    /// registration is a configuration error.
    pub async fn register(
        &self,
        registration: ChargerRegistration,
        client: Arc<dyn ChargerClient>,
    ) -> Result<String, SyncError> {
        registration.validate()?;
        let name = registration
            .name
            .clone()
            .ok_or_else(|| SyncError::Config("charger registration has no name".into()))?;

        let mut chargers = self.inner.write().await;
        if chargers.contains_key(&name) {
            return Err(SyncError::Config(format!(
                "charger '{}' is already registered",
                name
            )));
        }

        tracing::info!("Registered charger '{}' at {}", name, registration.host);
        chargers.insert(
            name.clone(),
            RegisteredCharger {
                registration,
                client,
            },
        );
        Ok(name)
    }

    /// Register a charger configured by address only: query the device once
    /// and use its serial number as the name.
    pub async fn register_discovered(
        &self,
        mut registration: ChargerRegistration,
        client: Arc<dyn ChargerClient>,
    ) -> Result<String, SyncError> {
        registration.validate()?;
        if registration.name.is_none() {
            let status = client.request_status().await?;
            let serial = status
                .get(fields::SERIAL_NUMBER)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    SyncError::Config(format!(
                        "charger at {} reported no serial number",
                        registration.host
                    ))
                })?;
            tracing::debug!(
                "Discovered serial '{}' for charger at {}",
                serial,
                registration.host
            );
            registration.name = Some(serial);
        }
        self.register(registration, client).await
    }

    /// Remove a charger from the registry. It is excluded from subsequent
    /// poll cycles; its last state table entry is not touched here.
    pub async fn deregister(&self, name: &str) -> bool {
        let removed = self.inner.write().await.remove(name).is_some();
        if removed {
            tracing::info!("Deregistered charger '{}'", name);
        } else {
            tracing::warn!("Deregister requested for unknown charger '{}'", name);
        }
        removed
    }

    /// Options update path: the only mutation allowed on a live
    /// registration.
    pub async fn set_correction_factor(&self, name: &str, factor: f64) -> Result<(), SyncError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(SyncError::Config(format!(
                "correction factor must be a non-negative number, got {}",
                factor
            )));
        }
        let mut chargers = self.inner.write().await;
        let charger = chargers
            .get_mut(name)
            .ok_or_else(|| SyncError::UnknownTarget(name.to_string()))?;
        charger.registration.correction_factor = factor;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<RegisteredCharger> {
        self.inner.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Point-in-time view for one poll or dispatch cycle.
    pub async fn snapshot(&self) -> Vec<RegisteredCharger> {
        let mut chargers: Vec<RegisteredCharger> =
            self.inner.read().await.values().cloned().collect();
        chargers.sort_by(|a, b| a.name().cmp(b.name()));
        chargers
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
