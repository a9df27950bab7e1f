//! Custom error types for the crate.
//!
//! This module defines the primary error type, `SyncError`. Using the `thiserror`
//! crate, it provides a centralized and consistent way to report the few things that
//! can actually fail around the reconciliation core: loading configuration, reading
//! snapshot logs, and addressing fields that were never bound.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type
//!   mismatches in `pico_sync.toml` or the `PICO_SYNC_*` environment.
//! - **`Configuration`**: Semantic errors found by `DashboardConfig::validate`
//!   (values that parse but make no sense, e.g. a zero poll interval).
//! - **`Io`** / **`Json`**: Reading and decoding snapshot logs.
//! - **`UnknownField`** / **`FieldLocked`**: Field Synchronizer addressing errors.
//! - **`Source`** / **`ChannelClosed`**: The poll loop's collaborators went away.
//!
//! Snapshot gaps, non-numeric counters and zero targets are deliberately NOT errors:
//! the reconciliation core recovers from those locally and keeps the last good value.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised by the reconciliation core and its collaborators.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field '{0}' is not bound")]
    UnknownField(String),

    #[error("Field '{0}' is locked while a capture is running")]
    FieldLocked(String),

    #[error("Snapshot source error: {0}")]
    Source(String),

    #[error("Controller channel closed")]
    ChannelClosed,
}

impl From<figment::Error> for SyncError {
    fn from(value: figment::Error) -> Self {
        SyncError::Config(Box::new(value))
    }
}

impl SyncError {
    /// Whether the poll loop can carry on after this error.
    ///
    /// Addressing and transport hiccups are expected under normal polling jitter;
    /// configuration problems and a closed channel are not.
    pub fn can_recover(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownField(_)
                | SyncError::FieldLocked(_)
                | SyncError::Source(_)
                | SyncError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_are_recoverable() {
        assert!(SyncError::UnknownField("capture-count".into()).can_recover());
        assert!(SyncError::FieldLocked("time-base-input".into()).can_recover());
        assert!(SyncError::Source("connection reset".into()).can_recover());
    }

    #[test]
    fn config_errors_are_fatal() {
        assert!(!SyncError::Configuration("poll_interval_ms".into()).can_recover());
        assert!(!SyncError::ChannelClosed.can_recover());
    }

    #[test]
    fn messages_name_the_field() {
        let err = SyncError::FieldLocked("repeat-amount".into());
        assert_eq!(
            err.to_string(),
            "Field 'repeat-amount' is locked while a capture is running"
        );
    }
}
