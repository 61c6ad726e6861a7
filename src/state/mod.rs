//! Shared charger state table
//!
//! Charger name → last accepted snapshot. Constructed as a writer/reader
//! pair: the poller holds the single `StateWriter`, the host's entity layer
//! holds cloneable `StateReader`s. Writes outside the poller cannot happen
//! by construction.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::ChargerState;

type Table = Arc<RwLock<HashMap<String, ChargerState>>>;

/// Build an empty state table and split it into its two roles.
pub fn state_table() -> (StateWriter, StateReader) {
    let table: Table = Arc::new(RwLock::new(HashMap::new()));
    (
        StateWriter {
            table: table.clone(),
        },
        StateReader { table },
    )
}

/// The one writing handle. Deliberately not `Clone`.
pub struct StateWriter {
    table: Table,
}

impl StateWriter {
    /// Replace a charger's snapshot wholesale.
    pub async fn commit(&self, name: &str, state: ChargerState) {
        self.table.write().await.insert(name.to_string(), state);
    }

    /// Explicit removal, for host-driven cleanup after a teardown. Poll
    /// failures never call this; stale entries are kept as last-known-good.
    pub async fn remove(&self, name: &str) -> bool {
        self.table.write().await.remove(name).is_some()
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            table: self.table.clone(),
        }
    }
}

/// Read-only view handed to entity code.
#[derive(Clone)]
pub struct StateReader {
    table: Table,
}

impl StateReader {
    pub async fn get(&self, name: &str) -> Option<ChargerState> {
        self.table.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.table.read().await.contains_key(name)
    }

    pub async fn charger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn snapshot(&self) -> HashMap<String, ChargerState> {
        self.table.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}
