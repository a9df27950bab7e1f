//! Snapshot logs.
//!
//! A snapshot log is a JSON-lines file with one parameter-tree response per
//! line, as captured from the adapter. Blank lines and lines starting with `#`
//! are skipped. Replaying a log through the poller reproduces a capture session
//! without an instrument attached.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::poller::SnapshotSource;
use crate::snapshot::Snapshot;

/// Parse a snapshot log.
pub fn parse_snapshot_log(contents: &str) -> SyncResult<Vec<Snapshot>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            Snapshot::from_json_str(line).map_err(|e| {
                SyncError::Source(format!("snapshot log line {}: {e}", idx + 1))
            })
        })
        .collect()
}

/// Snapshot source backed by a recorded log.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    snapshots: VecDeque<Snapshot>,
}

impl ReplaySource {
    /// Replay the given snapshots in order.
    pub fn new(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        Self {
            snapshots: snapshots.into_iter().collect(),
        }
    }

    /// Load a JSON-lines snapshot log from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let snapshots = parse_snapshot_log(&contents)?;
        debug!(path = %path.as_ref().display(), count = snapshots.len(), "snapshot log loaded");
        Ok(Self::new(snapshots))
    }

    /// Snapshots not yet replayed.
    pub fn remaining(&self) -> usize {
        self.snapshots.len()
    }
}

#[async_trait]
impl SnapshotSource for ReplaySource {
    async fn fetch(&mut self) -> SyncResult<Option<Snapshot>> {
        Ok(self.snapshots.pop_front())
    }
}
