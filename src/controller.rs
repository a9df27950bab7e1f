//! Dashboard controller
//!
//! Owns the Field Synchronizer and the Progress Estimator for one mounted view
//! and drives both from the same snapshot. The controller is created when the
//! view mounts and consumed by [`DashboardController::unmount`]; since idle
//! deadlines live inside it, nothing can fire against a view that is gone.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::display::StatusLine;
use crate::error::{SyncError, SyncResult};
use crate::fields::{default_bindings, FieldId, FieldLocks, FieldSynchronizer, FieldUpdate, WriteRequest};
use crate::progress::{ProgressEstimator, ProgressReport};
use crate::snapshot::{FieldValue, Operation, Snapshot, TreePath};

/// User input routed to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Field gained focus.
    Focus(FieldId),
    /// Field content changed (keystroke, selection).
    Change(FieldId),
    /// Field lost focus.
    Blur(FieldId),
    /// Field edit confirmed; yields a backend write.
    Commit(FieldId, FieldValue),
}

impl UiEvent {
    /// Field the event targets.
    pub fn field(&self) -> &FieldId {
        match self {
            UiEvent::Focus(field)
            | UiEvent::Change(field)
            | UiEvent::Blur(field)
            | UiEvent::Commit(field, _) => field,
        }
    }
}

/// Everything the view needs after one poll tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    /// Fields whose displayed value changed.
    pub updates: Vec<FieldUpdate>,
    /// Fields force-blurred because their idle deadline passed.
    pub expired: Vec<FieldId>,
    /// Progress of the active operation.
    pub progress: ProgressReport,
    /// Derived status strings.
    pub status: StatusLine,
    /// Whether an operation is running (inputs locked).
    pub running: bool,
}

/// Per-view reconciliation state.
#[derive(Debug)]
pub struct DashboardController {
    fields: FieldSynchronizer,
    progress: ProgressEstimator,
    locks: FieldLocks,
    ticks: u64,
}

impl DashboardController {
    /// Mount a view with the given field bindings.
    pub fn mount<I>(config: &DashboardConfig, bindings: I) -> Self
    where
        I: IntoIterator<Item = (FieldId, TreePath)>,
    {
        let fields = FieldSynchronizer::with_bindings(config.idle_timeout(), bindings);
        info!(fields = fields.len(), idle_timeout_ms = config.idle_timeout_ms, "dashboard mounted");
        Self {
            fields,
            progress: ProgressEstimator::new(),
            locks: FieldLocks::UNLOCKED,
            ticks: 0,
        }
    }

    /// Mount a view with every dashboard field bound.
    pub fn with_default_bindings(config: &DashboardConfig) -> Self {
        Self::mount(config, default_bindings())
    }

    /// Process one snapshot: expire idle focus, sync fields, then estimate progress.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot, now: Instant) -> TickOutcome {
        self.ticks += 1;
        let expired = self.fields.expire_idle(now);
        let updates = self.fields.apply_snapshot(snapshot);

        let operation = Operation::from_snapshot(snapshot);
        let running = operation.is_active();
        self.locks = FieldLocks::from_snapshot(snapshot, running);
        let progress = self.progress.tick(&operation).clone();

        debug!(
            tick = self.ticks,
            updated = updates.len(),
            percentage = progress.percentage,
            "snapshot applied"
        );

        TickOutcome {
            updates,
            expired,
            progress,
            status: StatusLine::from_snapshot(snapshot),
            running,
        }
    }

    /// Route a user event. Commits return the write to send to the backend.
    pub fn on_event(&mut self, event: UiEvent, now: Instant) -> SyncResult<Option<WriteRequest>> {
        match event {
            UiEvent::Focus(field) => self.fields.on_focus(&field, now).map(|_| None),
            UiEvent::Change(field) => self.fields.on_change(&field, now).map(|_| None),
            UiEvent::Blur(field) => self.fields.on_blur(&field).map(|_| None),
            UiEvent::Commit(field, value) => {
                if self.locks.is_locked(&field) {
                    warn!(%field, "edit rejected, field is locked");
                    return Err(SyncError::FieldLocked(field.to_string()));
                }
                self.fields.commit(&field, value, now).map(Some)
            }
        }
    }

    /// Blur fields whose idle deadline has passed.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<FieldId> {
        self.fields.expire_idle(now)
    }

    /// Earliest idle deadline across all fields.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.fields.next_deadline()
    }

    /// Field state.
    pub fn fields(&self) -> &FieldSynchronizer {
        &self.fields
    }

    /// Last published progress.
    pub fn progress(&self) -> &ProgressReport {
        self.progress.report()
    }

    /// Current input locks.
    pub fn locks(&self) -> FieldLocks {
        self.locks
    }

    /// Snapshots processed since mount.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tear the view down, cancelling every idle deadline.
    pub fn unmount(mut self) {
        let pending = self.fields.pending_timers();
        self.fields.cancel_all();
        info!(ticks = self.ticks, cancelled_timers = pending, "dashboard unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn running_snapshot() -> Snapshot {
        Snapshot::new(json!({
            "device": {
                "commands": { "run_user_capture": true },
                "settings": {
                    "capture": { "capture_repeat": true, "repeat_amount": 4, "n_captures": 10 }
                },
                "live_view": { "current_capture": 0, "capture_count": 5, "captures_requested": 10 }
            }
        }))
    }

    #[test]
    fn test_snapshot_drives_fields_and_progress() {
        let mut controller = DashboardController::with_default_bindings(&DashboardConfig::default());
        let outcome = controller.on_snapshot(&running_snapshot(), Instant::now());

        assert!(outcome.running);
        assert_eq!(outcome.progress.percentage, 12.5);
        assert!(outcome
            .updates
            .iter()
            .any(|u| u.field.as_str() == "repeat-amount" && u.value == FieldValue::Integer(4)));
        assert_eq!(controller.ticks(), 1);
    }

    #[test]
    fn test_commit_rejected_while_running() {
        let now = Instant::now();
        let mut controller = DashboardController::with_default_bindings(&DashboardConfig::default());
        controller.on_snapshot(&running_snapshot(), now);

        let err = controller
            .on_event(UiEvent::Commit(FieldId::from("repeat-amount"), FieldValue::Integer(2)), now)
            .unwrap_err();
        assert!(matches!(err, SyncError::FieldLocked(_)));
    }

    #[test]
    fn test_commit_allowed_when_idle() {
        let now = Instant::now();
        let mut controller = DashboardController::with_default_bindings(&DashboardConfig::default());
        let write = controller
            .on_event(UiEvent::Commit(FieldId::from("sweep-end"), FieldValue::Float(40.0)), now)
            .unwrap()
            .unwrap();
        assert_eq!(write.path.as_str(), "gpib/temp_sweep");
        assert_eq!(write.key, "t_end");
    }

    #[test]
    fn test_overdue_focus_expires_before_sync() {
        let start = Instant::now();
        let config = DashboardConfig::default();
        let mut controller = DashboardController::with_default_bindings(&config);
        let field = FieldId::from("repeat-amount");
        controller.on_event(UiEvent::Focus(field.clone()), start).unwrap();

        let outcome = controller.on_snapshot(&running_snapshot(), start + config.idle_timeout() + Duration::from_millis(1));
        assert_eq!(outcome.expired, vec![field.clone()]);
        assert_eq!(controller.fields().display(&field), Some(&FieldValue::Integer(4)));
    }

    #[test]
    fn test_event_reports_target_field() {
        let event = UiEvent::Commit(FieldId::from("sweep-tol"), FieldValue::Float(0.1));
        assert_eq!(event.field().as_str(), "sweep-tol");
    }
}
