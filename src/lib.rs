//! # Pico Sync
//!
//! Client-side state reconciliation for a digitizer dashboard that polls the
//! backend's parameter tree every few hundred milliseconds. The backend is the
//! source of truth, but the operator is allowed to type: fields being edited are
//! held off until they blur, and fields left focused are blurred after an idle
//! period. Alongside that, the crate estimates a single capture progress value
//! from raw counters spread over a repeat loop and an optional temperature sweep.
//!
//! ## Crate Structure
//!
//! - **`snapshot`**: `Snapshot`, `TreePath`, `FieldValue`, and the `Operation`
//!   variant decoded from each snapshot.
//! - **`fields`**: The Field Synchronizer (focus, idle deadlines, commits) and the
//!   dashboard's field registry and input locks.
//! - **`progress`**: The Progress Estimator and its `ProgressReport`.
//! - **`controller`**: `DashboardController`, which owns both for one mounted view.
//! - **`poller`**: The tokio poll loop plus the `SnapshotSource` / `DashboardSink`
//!   seams for transports and views.
//! - **`replay`**: JSON-lines snapshot logs as a `SnapshotSource`.
//! - **`display`**: Derived status strings (SI units, output file path).
//! - **`config`** / **`logging`** / **`error`**: Figment configuration, tracing
//!   setup, and the `SyncError` type.

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod fields;
pub mod logging;
pub mod poller;
pub mod progress;
pub mod replay;
pub mod snapshot;

pub use controller::{DashboardController, TickOutcome, UiEvent};
pub use error::{SyncError, SyncResult};
pub use fields::{FieldId, FieldSynchronizer, WriteRequest};
pub use progress::{ProgressEstimator, ProgressReport};
pub use snapshot::{Operation, Snapshot, TreePath};
