//! Field table for the digitizer dashboard.
//!
//! Maps every editable control to the parameter-tree path it mirrors, and decides
//! which controls are read-only for a given snapshot.

use super::FieldId;
use crate::snapshot::{paths, Snapshot, TreePath};

const CHANNELS: [char; 4] = ['a', 'b', 'c', 'd'];

/// Per-channel controls: (field suffix, tree key).
const CHANNEL_FIELDS: [(&str, &str); 6] = [
    ("range", "range"),
    ("coupl", "coupling"),
    ("offset", "offset"),
    ("active", "active"),
    ("liveview", "live_view"),
    ("pha", "pha_active"),
];

const STATIC_FIELDS: &[(&str, &str)] = &[
    ("bit-mode-dropdown", "device/settings/mode/resolution"),
    ("time-base-input", "device/settings/mode/timebase"),
    ("trigger-enable", "device/settings/trigger/active"),
    ("trigger-source", "device/settings/trigger/source"),
    ("trigger-direction", "device/settings/trigger/direction"),
    ("trigger-threshold", "device/settings/trigger/threshold"),
    ("trigger-delay", "device/settings/trigger/delay"),
    ("trigger-auto", "device/settings/trigger/auto_trigger"),
    ("capture-pretrig-samples", "device/settings/capture/pre_trig_samples"),
    ("capture-posttrig-samples", "device/settings/capture/post_trig_samples"),
    ("capture-mode", "device/settings/capture/capture_mode"),
    ("capture-count", "device/settings/capture/n_captures"),
    ("capture-time", "device/settings/capture/capture_time"),
    ("cap-repeat", "device/settings/capture/capture_repeat"),
    ("repeat-amount", "device/settings/capture/repeat_amount"),
    ("delay-time", "device/settings/capture/capture_delay"),
    ("capture-folder-name", "device/settings/file/folder_name"),
    ("capture-file-name", "device/settings/file/file_name"),
    ("pha-num-bins", "device/settings/pha/num_bins"),
    ("pha-lower-range", "device/settings/pha/lower_range"),
    ("pha-upper-range", "device/settings/pha/upper_range"),
    ("gpib-enable", "gpib/gpib_control"),
    ("gpib-device-select", "gpib/selected_tec"),
    ("sweep-active", "gpib/temp_sweep/active"),
    ("sweep-start", "gpib/temp_sweep/t_start"),
    ("sweep-end", "gpib/temp_sweep/t_end"),
    ("sweep-step", "gpib/temp_sweep/t_step"),
    ("sweep-tol", "gpib/temp_sweep/tol"),
];

/// Fields that size a run; they stay editable between runs (subject to mode).
const RUN_SIZING: [&str; 4] = ["repeat-amount", "delay-time", "capture-count", "capture-time"];

/// Every editable dashboard field with its tree path.
pub fn default_bindings() -> Vec<(FieldId, TreePath)> {
    let channel_fields = CHANNELS.iter().flat_map(|channel| {
        CHANNEL_FIELDS.iter().map(move |(suffix, key)| {
            (
                FieldId::new(format!("channel-{channel}-{suffix}")),
                TreePath::new(format!("device/settings/channels/{channel}/{key}")),
            )
        })
    });

    STATIC_FIELDS
        .iter()
        .map(|(field, path)| (FieldId::from(*field), TreePath::from(*path)))
        .chain(channel_fields)
        .collect()
}

/// Read-only state of dashboard fields for one snapshot.
///
/// While any operation runs every field is locked. Between runs the run-sizing
/// fields follow the capture settings: repeat controls need repeats enabled, and
/// only the bound (count or time) of the current mode is editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocks {
    running: bool,
    repeat_enabled: bool,
    /// `None` until a snapshot has reported the capture mode.
    time_mode: Option<bool>,
}

impl FieldLocks {
    /// Nothing locked.
    pub const UNLOCKED: FieldLocks = FieldLocks {
        running: false,
        repeat_enabled: true,
        time_mode: None,
    };

    /// Derive locks from a snapshot and whether an operation is running.
    pub fn from_snapshot(snapshot: &Snapshot, running: bool) -> Self {
        Self {
            running,
            repeat_enabled: snapshot.flag(paths::REPEAT_ENABLED),
            time_mode: Some(snapshot.flag(paths::CAPTURE_MODE)),
        }
    }

    /// Whether edits to `field` must be refused.
    pub fn is_locked(&self, field: &FieldId) -> bool {
        if self.running {
            return true;
        }
        if !Self::is_run_sizing(field) {
            return false;
        }
        match field.as_str() {
            "repeat-amount" | "delay-time" => !self.repeat_enabled,
            "capture-count" => self.time_mode == Some(true),
            "capture-time" => self.time_mode == Some(false),
            _ => false,
        }
    }

    /// Whether `field` sizes a run.
    pub fn is_run_sizing(field: &FieldId) -> bool {
        RUN_SIZING.contains(&field.as_str())
    }
}

impl Default for FieldLocks {
    fn default() -> Self {
        Self::UNLOCKED
    }
}
