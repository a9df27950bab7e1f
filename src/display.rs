//! Read-only status strings derived from a snapshot.

use serde::Serialize;

use crate::snapshot::{FieldValue, Snapshot, TreePath};

const SAMPLE_INTERVAL: &str = "device/settings/mode/samp_time";
const FOLDER_NAME: &str = "device/settings/file/folder_name";
const FILE_NAME: &str = "device/settings/file/file_name";
const SYSTEM_STATE: &str = "device/flags/system_state";

/// SI prefixes from femto to unity, smallest first.
const SI_SCALES: [(i32, &str); 6] = [(-15, "f"), (-12, "p"), (-9, "n"), (-6, "μ"), (-3, "m"), (0, "")];

/// Format a value with the largest SI prefix that keeps it at or above 1.
///
/// Values below one femto-unit (including zero) are shown in femto. The prefix is
/// always preceded by a space, so unity values end in one (`"2.50 "`).
pub fn to_si_unit(value: f64) -> String {
    let magnitude = value.abs();
    let mut idx = SI_SCALES.len() - 1;
    let mut scaled = magnitude / 10f64.powi(SI_SCALES[idx].0);
    while scaled < 1.0 && idx > 0 {
        idx -= 1;
        scaled = magnitude / 10f64.powi(SI_SCALES[idx].0);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{scaled:.2} {}", SI_SCALES[idx].1)
}

/// Relative path the backend writes the next capture file to.
pub fn output_file_path(folder: &str, file: &str) -> String {
    if folder.is_empty() || folder.ends_with('/') {
        format!("data/{folder}{file}")
    } else {
        format!("data/{folder}/{file}")
    }
}

/// Status strings shown next to the controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusLine {
    /// Sample interval, e.g. `16.00 n` (seconds).
    pub sample_interval: Option<String>,
    /// Output file path.
    pub output_file: Option<String>,
    /// Backend state machine name.
    pub system_state: Option<String>,
}

impl StatusLine {
    /// Derive the status line. Absent inputs leave the corresponding entry `None`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let text = |path: &str| match snapshot.field_value(&TreePath::new(path)) {
            Some(FieldValue::Text(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        };

        let output_file = match (text(FOLDER_NAME), text(FILE_NAME)) {
            (Some(folder), Some(file)) => Some(output_file_path(&folder, &file)),
            _ => None,
        };

        Self {
            sample_interval: snapshot.number(SAMPLE_INTERVAL).map(to_si_unit),
            output_file,
            system_state: text(SYSTEM_STATE),
        }
    }
}
