//! Error handling module

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No valid value for '{attribute}': {given}")]
    InvalidValue { attribute: String, given: String },

    #[error("Charger with name '{0}' not found")]
    UnknownTarget(String),

    #[error("Incomplete status reading from charger '{0}'")]
    IncompleteReading(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// True for failures that degrade to last-known state instead of
    /// aborting the surrounding cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::IncompleteReading(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Transport("timeout".into()).is_transient());
        assert!(SyncError::IncompleteReading("garage".into()).is_transient());
        assert!(!SyncError::UnknownTarget("garage".into()).is_transient());
        assert!(!SyncError::Config("bad factor".into()).is_transient());
    }

    #[test]
    fn test_invalid_value_message() {
        let err = SyncError::InvalidValue {
            attribute: "max_current".into(),
            given: "sensor.unknown".into(),
        };
        assert_eq!(
            err.to_string(),
            "No valid value for 'max_current': sensor.unknown"
        );
    }
}
