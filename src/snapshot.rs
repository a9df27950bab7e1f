//! Parameter-tree snapshots and the operation they describe.
//!
//! A [`Snapshot`] is one polled, point-in-time copy of the backend's parameter
//! tree. Nothing in it is trusted to be present: every lookup goes through
//! [`Snapshot::get`], which returns `None` for a missing path, and every counter is
//! checked for finiteness before it is allowed near a division.
//!
//! [`Operation::from_snapshot`] collapses the handful of flags the backend
//! reports (`run_user_capture`, `gpio/listening`, `capture_repeat`, ...) into one
//! tagged variant, so the progress estimator never has to combine booleans itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Slash-separated path into the parameter tree, e.g. `device/settings/capture/repeat_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(String);

impl TreePath {
    /// Build a path, dropping empty segments and surrounding slashes.
    pub fn new(path: impl AsRef<str>) -> Self {
        let cleaned = path
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(cleaned)
    }

    /// The path as written, without leading slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Split into `(parent, key)`; the key is the last segment.
    ///
    /// Returns `None` for the empty (root) path.
    pub fn split_last(&self) -> Option<(TreePath, &str)> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, key)) => Some((TreePath::new(parent), key)),
            None => Some((TreePath::new(""), self.0.as_str())),
        }
    }

    fn pointer(&self) -> String {
        // RFC 6901: a literal '~' inside a segment is written as "~0".
        self.segments()
            .map(|segment| format!("/{}", segment.replace('~', "~0")))
            .collect()
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TreePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Scalar value displayed by a bound field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox or toggle.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Any other finite number.
    Float(f64),
    /// Free text or dropdown selection.
    Text(String),
}

impl FieldValue {
    /// Convert a tree value into a field value.
    ///
    /// Only scalars are displayable; `null`, arrays and objects yield `None` and
    /// are treated like a missing path by the synchronizer.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// JSON form used in write bodies.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// One polled copy of the parameter tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    root: Value,
}

impl Snapshot {
    /// Wrap an already-parsed tree.
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Parse a snapshot from the adapter's JSON response body.
    pub fn from_json_str(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body).map(Self::new)
    }

    /// The raw tree.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Look up a path. Missing intermediate nodes yield `None`.
    pub fn get(&self, path: &TreePath) -> Option<&Value> {
        self.root.pointer(&path.pointer())
    }

    /// Scalar at `path`, if present and displayable.
    pub fn field_value(&self, path: &TreePath) -> Option<FieldValue> {
        self.get(path).and_then(FieldValue::from_json)
    }

    /// `true` only when the path holds the boolean `true`.
    pub fn flag(&self, path: &str) -> bool {
        self.get(&TreePath::new(path))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Finite number at `path`. Strings, booleans, NaN and infinities yield `None`.
    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(&TreePath::new(path))
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
    }

    /// Non-negative integer index at `path`.
    pub fn index(&self, path: &str) -> Option<u32> {
        self.number(path)
            .filter(|n| *n >= 0.0)
            .map(|n| n.min(f64::from(u32::MAX)) as u32)
    }
}

/// Tree paths read by [`Operation::from_snapshot`].
pub mod paths {
    /// External trigger (GPIO) run is armed.
    pub const TRIGGER_LISTENING: &str = "device/gpio/listening";
    /// Triggers captured so far in the GPIO run.
    pub const TRIGGER_DONE: &str = "device/gpio/gpio_captures";
    /// Configured number of triggered captures.
    pub const TRIGGER_TARGET: &str = "device/gpio/capture_run";

    /// User capture is executing.
    pub const CAPTURE_ACTIVE: &str = "device/commands/run_user_capture";
    /// `true` selects time-bounded captures.
    pub const CAPTURE_MODE: &str = "device/settings/capture/capture_mode";
    /// Repeat axis enabled.
    pub const REPEAT_ENABLED: &str = "device/settings/capture/capture_repeat";
    /// Repeat axis size.
    pub const REPEAT_TARGET: &str = "device/settings/capture/repeat_amount";
    /// Zero-based repeat index.
    pub const REPEAT_INDEX: &str = "device/live_view/current_capture";
    /// GPIB control enabled; the sweep axis needs both this and the sweep flag.
    pub const GPIB_CONTROL: &str = "gpib/gpib_control";
    /// Temperature sweep enabled.
    pub const SWEEP_ACTIVE: &str = "gpib/temp_sweep/active";
    /// Sweep axis size.
    pub const SWEEP_TARGET: &str = "device/live_view/sweep_total";
    /// Zero-based sweep index.
    pub const SWEEP_INDEX: &str = "device/live_view/sweep_index";
    /// Captures done in the current cell (count mode).
    pub const COUNT_DONE: &str = "device/live_view/capture_count";
    /// Captures requested for the current cell (count mode).
    pub const COUNT_REQUESTED: &str = "device/live_view/captures_requested";
    /// Seconds elapsed in the current cell (time mode).
    pub const TIME_ELAPSED: &str = "device/live_view/current_tbdc_time";
    /// Target seconds per cell (time mode).
    pub const TIME_TARGET: &str = "device/settings/capture/capture_time";
}

/// How a single cell's repeats are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Bounded by a number of captures.
    Count,
    /// Bounded by a duration.
    Time,
}

/// One repetition axis of a capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Whether the axis takes part in the run.
    pub enabled: bool,
    /// Zero-based position as last reported.
    pub index: u32,
    /// Axis size, never below 1.
    pub total: u32,
}

impl Axis {
    /// A disabled axis: one implicit iteration at index 0.
    pub const DISABLED: Axis = Axis {
        enabled: false,
        index: 0,
        total: 1,
    };

    /// Enabled axis; `total` is clamped to at least 1.
    pub fn enabled(index: u32, total: u32) -> Self {
        Self {
            enabled: true,
            index,
            total: total.max(1),
        }
    }
}

/// `done` over `target`, both optional because either may be missing or non-numeric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    /// Progress so far.
    pub done: Option<f64>,
    /// Value at which the cell is complete.
    pub target: Option<f64>,
}

impl Ratio {
    /// Both sides known.
    pub fn new(done: f64, target: f64) -> Self {
        Self {
            done: Some(done),
            target: Some(target),
        }
    }

    /// `done / target` clamped to `0.0..=1.0`.
    ///
    /// `None` when either side is missing or non-finite, or the target is not
    /// positive: a zero target is "unknown", never "finished".
    pub fn fraction(&self) -> Option<f64> {
        let done = self.done.filter(|d| d.is_finite())?;
        let target = self.target.filter(|t| t.is_finite() && *t > 0.0)?;
        Some((done / target).clamp(0.0, 1.0))
    }
}

/// What the instrument is doing, as far as progress reporting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Nothing running.
    Idle,
    /// User capture structured as sweep x repeat cells.
    RepeatSweepRun {
        /// Count- or time-bounded cells.
        mode: CaptureMode,
        /// Inner loop.
        repeat: Axis,
        /// Outer (temperature sweep) loop.
        sweep: Axis,
        /// Count-mode counters for the current cell.
        count: Ratio,
        /// Time-mode counters for the current cell.
        time: Ratio,
    },
    /// Capture driven by an external trigger counter.
    TriggerRun {
        /// Triggers captured so far and the configured target.
        triggers: Ratio,
    },
}

impl Operation {
    /// Decode the active operation from a snapshot.
    ///
    /// A listening trigger run wins over a user capture; the two are never blended.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.flag(paths::TRIGGER_LISTENING) {
            return Operation::TriggerRun {
                triggers: Ratio {
                    done: snapshot.number(paths::TRIGGER_DONE),
                    target: snapshot.number(paths::TRIGGER_TARGET),
                },
            };
        }

        if !snapshot.flag(paths::CAPTURE_ACTIVE) {
            return Operation::Idle;
        }

        let mode = if snapshot.flag(paths::CAPTURE_MODE) {
            CaptureMode::Time
        } else {
            CaptureMode::Count
        };

        let repeat = if snapshot.flag(paths::REPEAT_ENABLED) {
            Axis::enabled(
                snapshot.index(paths::REPEAT_INDEX).unwrap_or(0),
                snapshot.index(paths::REPEAT_TARGET).unwrap_or(1),
            )
        } else {
            Axis::DISABLED
        };

        let sweep = if snapshot.flag(paths::GPIB_CONTROL) && snapshot.flag(paths::SWEEP_ACTIVE) {
            Axis::enabled(
                snapshot.index(paths::SWEEP_INDEX).unwrap_or(0),
                snapshot.index(paths::SWEEP_TARGET).unwrap_or(1),
            )
        } else {
            Axis::DISABLED
        };

        Operation::RepeatSweepRun {
            mode,
            repeat,
            sweep,
            count: Ratio {
                done: snapshot.number(paths::COUNT_DONE),
                target: snapshot.number(paths::COUNT_REQUESTED),
            },
            time: Ratio {
                done: snapshot.number(paths::TIME_ELAPSED),
                target: snapshot.number(paths::TIME_TARGET),
            },
        }
    }

    /// Whether any operation is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, Operation::Idle)
    }
}
