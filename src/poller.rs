//! Snapshot poll loop.
//!
//! One task owns the [`DashboardController`] and serialises everything that
//! touches it: poll ticks, user events, and the idle-deadline scheduler. The next
//! poll is scheduled a fixed delay after the previous tick has been fully
//! processed, so a slow backend stretches the cadence instead of queueing ticks.
//!
//! Shutting down (or dropping the [`PollerHandle`]) stops polling and unmounts
//! the controller, which cancels every pending idle deadline. Errors are logged
//! and the loop carries on, unless [`SyncError::can_recover`] says otherwise.

use async_trait::async_trait;
use std::future::pending;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::controller::{DashboardController, TickOutcome, UiEvent};
use crate::error::{SyncError, SyncResult};
use crate::fields::{FieldId, WriteRequest};
use crate::snapshot::Snapshot;

/// Where snapshots come from (an HTTP adapter, a replay log, a test fixture).
#[async_trait]
pub trait SnapshotSource: Send {
    /// Fetch the next snapshot. `Ok(None)` means the source is exhausted.
    async fn fetch(&mut self) -> SyncResult<Option<Snapshot>>;
}

/// Where results go: the view layer and the backend writer.
#[async_trait]
pub trait DashboardSink: Send {
    /// Render one processed tick.
    async fn render(&mut self, outcome: &TickOutcome);

    /// Fields blurred by the idle scheduler between ticks.
    async fn blurred(&mut self, _fields: &[FieldId]) {}

    /// Send a committed edit to the backend.
    async fn write(&mut self, request: WriteRequest) -> SyncResult<()>;
}

/// Handle to a running poll loop.
pub struct PollerHandle {
    events: mpsc::UnboundedSender<UiEvent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Forward a user event to the controller.
    pub fn send(&self, event: UiEvent) -> SyncResult<()> {
        self.events.send(event).map_err(|_| SyncError::ChannelClosed)
    }

    /// A sender that can be handed to input callbacks.
    pub fn events(&self) -> mpsc::UnboundedSender<UiEvent> {
        self.events.clone()
    }

    /// Whether the loop has exited on its own (source exhausted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling and wait for the controller to unmount.
    pub async fn shutdown(mut self) -> SyncResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    /// Wait for the loop to exit without requesting shutdown.
    pub async fn join(self) -> SyncResult<()> {
        self.task
            .await
            .map_err(|e| SyncError::Source(format!("poll task failed: {e}")))
    }
}

/// Start the poll loop on the current tokio runtime.
///
/// The first poll happens immediately.
pub fn spawn<S, K>(
    controller: DashboardController,
    source: S,
    sink: K,
    poll_interval: Duration,
) -> PollerHandle
where
    S: SnapshotSource + 'static,
    K: DashboardSink + 'static,
{
    let (events, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(run(
        controller,
        source,
        sink,
        poll_interval,
        events_rx,
        shutdown_rx,
    ));

    PollerHandle {
        events,
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

async fn run<S, K>(
    mut controller: DashboardController,
    mut source: S,
    mut sink: K,
    poll_interval: Duration,
    mut events_rx: mpsc::UnboundedReceiver<UiEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    S: SnapshotSource,
    K: DashboardSink,
{
    info!(interval = ?poll_interval, "poller started");
    let mut next_poll = Instant::now();

    loop {
        let idle_deadline = controller.next_deadline().map(Instant::from_std);

        tokio::select! {
            biased;

            // Fires on explicit shutdown and when the handle is dropped.
            _ = &mut shutdown_rx => {
                debug!("shutdown requested");
                break;
            }

            Some(event) = events_rx.recv() => {
                let field = event.field().clone();
                match controller.on_event(event, Instant::now().into_std()) {
                    Ok(Some(request)) => {
                        if let Err(e) = sink.write(request).await {
                            warn!(%field, error = %e, "backend write failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.can_recover() => warn!(%field, error = %e, "ui event ignored"),
                    Err(e) => {
                        error!(%field, error = %e, "ui event failed, stopping");
                        break;
                    }
                }
            }

            _ = sleep_until_deadline(idle_deadline) => {
                let expired = controller.expire_idle(Instant::now().into_std());
                if !expired.is_empty() {
                    sink.blurred(&expired).await;
                }
            }

            _ = sleep_until(next_poll) => {
                match source.fetch().await {
                    Ok(Some(snapshot)) => {
                        let outcome = controller.on_snapshot(&snapshot, Instant::now().into_std());
                        sink.render(&outcome).await;
                    }
                    Ok(None) => {
                        info!("snapshot source exhausted");
                        break;
                    }
                    Err(e) if e.can_recover() => {
                        warn!(error = %e, "snapshot fetch failed, skipping tick");
                    }
                    Err(e) => {
                        error!(error = %e, "snapshot source failed, stopping");
                        break;
                    }
                }
                next_poll = Instant::now() + poll_interval;
            }
        }
    }

    controller.unmount();
    info!("poller stopped");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
