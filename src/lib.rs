//! charger-sync-gateway - EV charger synchronization core
//!
//! Keeps a shared state table in sync with a fleet of go-e wall chargers
//! and dispatches normalized control commands to them. The host runtime
//! owns timers, entities and the device wire protocol; this crate owns the
//! poll/aggregate cycle, the command pipeline and the state table.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod poller;
pub mod state;

#[cfg(test)]
mod testutil;

pub use client::{ChargerClient, ChargerRegistry, RegisteredCharger};
pub use config::{ChargerRegistration, Config};
pub use dispatch::{
    CommandDispatcher, NoExternalValues, SetterPayload, TargetOutcome, ValueResolver,
};
pub use error::SyncError;
pub use models::{
    CableLockMode, ChargerState, CommandRequest, CommandValue, ControlAttribute, StatusMap,
};
pub use poller::StatePoller;
pub use state::{state_table, StateReader, StateWriter};
