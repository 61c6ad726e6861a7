//! Charger poll scheduler
//!
//! Queries every registered charger on a fixed interval and merges accepted
//! snapshots into the shared state table. The poller owns the table's only
//! writing handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::client::{ChargerRegistry, RegisteredCharger};
use crate::error::SyncError;
use crate::models::{status_is_complete, ChargerState};
use crate::state::{StateReader, StateWriter};

/// Polls all registered chargers and aggregates their state.
pub struct StatePoller {
    registry: ChargerRegistry,
    writer: StateWriter,
    poll_interval: Duration,
    // Serializes cycles so a dispatcher-triggered refresh can never overlap
    // the periodic tick for the same charger.
    cycle_lock: Mutex<()>,
}

impl StatePoller {
    pub fn new(registry: ChargerRegistry, writer: StateWriter, poll_interval: Duration) -> Self {
        Self {
            registry,
            writer,
            poll_interval,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn reader(&self) -> StateReader {
        self.writer.reader()
    }

    /// Start the periodic poll loop. Runs until the task is dropped.
    pub async fn start(self: Arc<Self>) {
        tracing::info!(
            "Starting charger poller (interval {:?})...",
            self.poll_interval
        );

        let mut interval_timer = interval(self.poll_interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval_timer.tick().await;

            let results = self.refresh_all().await;
            let failed = results.values().filter(|ok| !**ok).count();
            if failed > 0 {
                tracing::warn!(
                    "Poll cycle finished with {}/{} chargers not updated",
                    failed,
                    results.len()
                );
            }
        }
    }

    /// Run one aggregate cycle: query every registered charger, commit the
    /// accepted snapshots, and report a success flag per charger. Failed
    /// chargers keep their previous state table entry untouched.
    pub async fn refresh_all(&self) -> HashMap<String, bool> {
        let _cycle = self.cycle_lock.lock().await;

        tracing::debug!("Updating status...");
        let chargers = self.registry.snapshot().await;

        let polls = chargers.iter().map(|charger| async move {
            let name = charger.name().to_string();
            let result = poll_one(charger).await;
            (name, result)
        });

        let mut flags = HashMap::new();
        for (name, result) in join_all(polls).await {
            match result {
                Ok(state) => {
                    tracing::debug!("Got state for '{}': {:?}", name, state.fields);
                    self.writer.commit(&name, state).await;
                    flags.insert(name, true);
                }
                Err(e) => {
                    tracing::error!("Unable to fetch state for charger '{}': {}", name, e);
                    flags.insert(name, false);
                }
            }
        }
        flags
    }
}

/// Query one charger and turn the response into a state entry. A response
/// whose primary status field is still the unknown sentinel counts as an
/// incomplete reading and is discarded.
async fn poll_one(charger: &RegisteredCharger) -> Result<ChargerState, SyncError> {
    tracing::debug!("update for '{}'..", charger.name());

    let status = charger.client.request_status().await?;
    if !status_is_complete(&status) {
        return Err(SyncError::IncompleteReading(charger.name().to_string()));
    }

    Ok(ChargerState::from_status(status, charger.correction_factor()))
}
