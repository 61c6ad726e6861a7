//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(20);
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chargers: Vec<ChargerRegistration>,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

/// One configured charger. Immutable after registration except for the
/// correction factor, which an options update may replace.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargerRegistration {
    /// Unique key; omitted for serial-discovered chargers and filled in
    /// from the device's serial number at registration time.
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_correction_factor")]
    pub correction_factor: f64,
}

fn default_scan_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_secs()
}

fn default_correction_factor() -> f64 {
    1.0
}

impl ChargerRegistration {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            host: host.into(),
            correction_factor: default_correction_factor(),
        }
    }

    pub fn with_correction_factor(mut self, factor: f64) -> Self {
        self.correction_factor = factor;
        self
    }

    /// Validated once here; polling trusts the stored value.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.host.trim().is_empty() {
            return Err(SyncError::Config("charger host must not be empty".into()));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(SyncError::Config("charger name must not be empty".into()));
            }
        }
        if !self.correction_factor.is_finite() || self.correction_factor < 0.0 {
            return Err(SyncError::Config(format!(
                "correction factor must be a non-negative number, got {}",
                self.correction_factor
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("CHARGER_SYNC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        // An absent file just leaves the serde defaults in place; a value
        // that fails to deserialize must surface, not fall back silently.
        let config: Config = settings.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        for charger in &self.chargers {
            charger.validate()?;
        }
        Ok(())
    }

    /// Effective poll interval, floored so misconfiguration cannot hammer
    /// the chargers.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs).max(MIN_UPDATE_INTERVAL)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chargers: Vec::new(),
            scan_interval_secs: default_scan_interval(),
        }
    }
}
