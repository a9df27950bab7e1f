//! Capture progress estimation.
//!
//! The backend never reports a ready-made progress value. It reports where a run
//! is (repeat index, sweep index) and instantaneous counters for the current cell,
//! and those counters are noisy around cell boundaries: an index can advance
//! before the counters reset. [`ProgressEstimator`] turns that into one percentage
//! that never goes backwards while the same operation stays active.
//!
//! Retained state is per operation variant. Entering a variant creates fresh
//! state, leaving it (to `Idle` or to the other variant) drops it, so an idle
//! instrument always reports zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::snapshot::{Axis, CaptureMode, Operation, Ratio};

/// Label shown when nothing is running and prefix for capture status.
pub const DEFAULT_LABEL: &str = "Capture Progress";

/// Label for external-trigger runs.
pub const TRIGGER_LABEL: &str = "GPIO Capture Progress";

/// What the view layer renders for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Overall progress, 0-100.
    pub percentage: f64,
    /// Status line, e.g. `Capture Progress: Repeat 2/4, Temp 1/3`.
    pub label: String,
    /// Compact position, e.g. `2/4`.
    pub done_over_total: String,
}

impl ProgressReport {
    /// Report for an idle instrument.
    pub fn idle() -> Self {
        Self {
            percentage: 0.0,
            label: DEFAULT_LABEL.to_string(),
            done_over_total: String::new(),
        }
    }
}

impl Default for ProgressReport {
    fn default() -> Self {
        Self::idle()
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.done_over_total.is_empty() {
            write!(f, "{:.1}%", self.percentage)
        } else {
            write!(f, "{:.1}% ({})", self.percentage, self.done_over_total)
        }
    }
}

/// Identity of one (repeat, sweep) cell. Displays as `"{repeat}-{sweep}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Zero-based repeat index.
    pub repeat: u32,
    /// Zero-based sweep index.
    pub sweep: u32,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.repeat, self.sweep)
    }
}

/// Retained state of a repeat/sweep run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Monotonic floor, 0-100.
    pub highest_progress: f64,
    /// Cell seen on the previous tick; `None` before the first counted tick.
    pub last_cell: Option<CellKey>,
    /// Cells finished so far, counted from cell-key changes.
    pub completed_cells: u32,
}

/// Turns a stream of operations into a monotonic progress report.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    capture: Option<ProgressState>,
    trigger_floor: Option<f64>,
    published: ProgressReport,
}

impl ProgressEstimator {
    /// Create an estimator in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick's operation into the retained state and return the report.
    ///
    /// Ticks whose counters are missing, non-finite or divide by zero leave the
    /// previous report in place.
    pub fn tick(&mut self, operation: &Operation) -> &ProgressReport {
        match operation {
            Operation::Idle => {
                if self.capture.is_some() || self.trigger_floor.is_some() {
                    debug!("operation finished, progress reset");
                }
                self.reset();
            }
            Operation::RepeatSweepRun {
                mode,
                repeat,
                sweep,
                count,
                time,
            } => {
                self.trigger_floor = None;
                let state = self.capture.get_or_insert_with(|| {
                    debug!("capture run started");
                    ProgressState::default()
                });
                let counters = match mode {
                    CaptureMode::Time => time,
                    CaptureMode::Count => count,
                };
                match estimate_capture(state, repeat, sweep, counters) {
                    Some(report) => self.published = report,
                    None => trace!(?mode, "cell counters unavailable, keeping last report"),
                }
            }
            Operation::TriggerRun { triggers } => {
                self.capture = None;
                let floor = self.trigger_floor.get_or_insert_with(|| {
                    debug!("trigger run started");
                    0.0
                });
                match estimate_trigger(floor, triggers) {
                    Some(report) => self.published = report,
                    None => trace!("trigger counters unavailable, keeping last report"),
                }
            }
        }
        &self.published
    }

    /// Last published report.
    pub fn report(&self) -> &ProgressReport {
        &self.published
    }

    /// Retained repeat/sweep state, if a capture run is being tracked.
    pub fn capture_state(&self) -> Option<&ProgressState> {
        self.capture.as_ref()
    }

    /// Drop all retained state and publish the idle report.
    pub fn reset(&mut self) {
        self.capture = None;
        self.trigger_floor = None;
        self.published = ProgressReport::idle();
    }
}

fn estimate_capture(
    state: &mut ProgressState,
    repeat: &Axis,
    sweep: &Axis,
    counters: &Ratio,
) -> Option<ProgressReport> {
    let cell_fraction = counters.fraction()?;

    let cell = CellKey {
        repeat: repeat.index,
        sweep: sweep.index,
    };
    if state.last_cell.is_some_and(|last| last != cell) {
        state.completed_cells = state.completed_cells.saturating_add(1);
        debug!(%cell, completed = state.completed_cells, "cell boundary crossed");
    }

    let total_cells = f64::from(repeat.total.max(1)) * f64::from(sweep.total.max(1));
    let weight = 100.0 / total_cells;
    let candidate = (f64::from(state.completed_cells) * weight + cell_fraction * weight).min(100.0);
    state.highest_progress = state.highest_progress.max(candidate);
    state.last_cell = Some(cell);

    Some(ProgressReport {
        percentage: state.highest_progress,
        label: capture_label(repeat, sweep),
        done_over_total: format!("{}/{}", repeat.index.saturating_add(1), repeat.total),
    })
}

fn estimate_trigger(floor: &mut f64, triggers: &Ratio) -> Option<ProgressReport> {
    let fraction = triggers.fraction()?;
    *floor = floor.max(fraction * 100.0);

    // fraction() succeeded, so both sides are present.
    let done = triggers.done.unwrap_or_default();
    let target = triggers.target.unwrap_or_default();
    Some(ProgressReport {
        percentage: *floor,
        label: TRIGGER_LABEL.to_string(),
        done_over_total: format!("{done}/{target}"),
    })
}

fn capture_label(repeat: &Axis, sweep: &Axis) -> String {
    let mut fragments = Vec::with_capacity(2);
    if repeat.enabled {
        fragments.push(format!(
            "Repeat {}/{}",
            repeat.index.saturating_add(1),
            repeat.total
        ));
    }
    if sweep.enabled {
        fragments.push(format!(
            "Temp {}/{}",
            sweep.index.saturating_add(1),
            sweep.total
        ));
    }
    if fragments.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        format!("{DEFAULT_LABEL}: {}", fragments.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_run(repeat: Axis, sweep: Axis, done: f64, requested: f64) -> Operation {
        Operation::RepeatSweepRun {
            mode: CaptureMode::Count,
            repeat,
            sweep,
            count: Ratio::new(done, requested),
            time: Ratio {
                done: None,
                target: None,
            },
        }
    }

    #[test]
    fn test_cell_key_format() {
        assert_eq!(CellKey { repeat: 2, sweep: 1 }.to_string(), "2-1");
    }

    #[test]
    fn test_first_tick_counts_no_completed_cells() {
        let mut estimator = ProgressEstimator::new();
        let report = estimator.tick(&count_run(Axis::enabled(0, 4), Axis::DISABLED, 5.0, 10.0));
        assert_eq!(report.percentage, 12.5);
        assert_eq!(report.label, "Capture Progress: Repeat 1/4");
        assert_eq!(report.done_over_total, "1/4");
        assert_eq!(estimator.capture_state().unwrap().completed_cells, 0);
    }

    #[test]
    fn test_regressing_fraction_within_cell_holds_floor() {
        let mut estimator = ProgressEstimator::new();
        estimator.tick(&count_run(Axis::enabled(0, 2), Axis::DISABLED, 8.0, 10.0));
        let report = estimator.tick(&count_run(Axis::enabled(0, 2), Axis::DISABLED, 2.0, 10.0));
        assert_eq!(report.percentage, 40.0);
    }

    #[test]
    fn test_sweep_and_repeat_label() {
        let mut estimator = ProgressEstimator::new();
        let report = estimator.tick(&count_run(Axis::enabled(1, 2), Axis::enabled(2, 3), 0.0, 10.0));
        assert_eq!(report.label, "Capture Progress: Repeat 2/2, Temp 3/3");
        assert_eq!(report.to_string(), "0.0% (2/2)");
    }

    #[test]
    fn test_no_axes_uses_bare_label() {
        let mut estimator = ProgressEstimator::new();
        let report = estimator.tick(&count_run(Axis::DISABLED, Axis::DISABLED, 1.0, 4.0));
        assert_eq!(report.label, DEFAULT_LABEL);
        assert_eq!(report.percentage, 25.0);
    }

    #[test]
    fn test_time_mode_uses_elapsed_ratio() {
        let mut estimator = ProgressEstimator::new();
        let op = Operation::RepeatSweepRun {
            mode: CaptureMode::Time,
            repeat: Axis::DISABLED,
            sweep: Axis::DISABLED,
            count: Ratio::new(9.0, 10.0),
            time: Ratio::new(3.0, 4.0),
        };
        assert_eq!(estimator.tick(&op).percentage, 75.0);
    }

    #[test]
    fn test_zero_requested_is_a_no_op_tick() {
        let mut estimator = ProgressEstimator::new();
        estimator.tick(&count_run(Axis::enabled(0, 4), Axis::DISABLED, 5.0, 10.0));
        let report = estimator.tick(&count_run(Axis::enabled(1, 4), Axis::DISABLED, 0.0, 0.0));
        assert_eq!(report.percentage, 12.5);
        // The skipped tick must not consume the cell change.
        assert_eq!(estimator.capture_state().unwrap().last_cell, Some(CellKey { repeat: 0, sweep: 0 }));
    }

    #[test]
    fn test_trigger_run() {
        let mut estimator = ProgressEstimator::new();
        let report = estimator.tick(&Operation::TriggerRun {
            triggers: Ratio::new(3.0, 12.0),
        });
        assert_eq!(report.percentage, 25.0);
        assert_eq!(report.label, TRIGGER_LABEL);
        assert_eq!(report.done_over_total, "3/12");

        // A counter glitch never lowers the published value.
        let report = estimator.tick(&Operation::TriggerRun {
            triggers: Ratio::new(1.0, 12.0),
        });
        assert_eq!(report.percentage, 25.0);
    }

    #[test]
    fn test_switching_variants_resets_the_other() {
        let mut estimator = ProgressEstimator::new();
        estimator.tick(&Operation::TriggerRun {
            triggers: Ratio::new(6.0, 12.0),
        });
        let report = estimator.tick(&count_run(Axis::DISABLED, Axis::DISABLED, 1.0, 10.0));
        assert_eq!(report.percentage, 10.0);

        let report = estimator.tick(&Operation::TriggerRun {
            triggers: Ratio::new(1.0, 12.0),
        });
        assert!((report.percentage - 100.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_idle_resets() {
        let mut estimator = ProgressEstimator::new();
        estimator.tick(&count_run(Axis::DISABLED, Axis::DISABLED, 9.0, 10.0));
        let report = estimator.tick(&Operation::Idle).clone();
        let report = &report;
        assert_eq!(report, &ProgressReport::idle());
        assert!(estimator.capture_state().is_none());
        assert_eq!(report.to_string(), "0.0%");
    }
}
