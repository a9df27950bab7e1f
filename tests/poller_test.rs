//! Poll loop behaviour under a paused tokio clock.

use async_trait::async_trait;
use pico_sync::config::DashboardConfig;
use pico_sync::poller::{self, DashboardSink, SnapshotSource};
use pico_sync::snapshot::FieldValue;
use pico_sync::{
    DashboardController, FieldId, Snapshot, SyncError, SyncResult, TickOutcome, UiEvent,
    WriteRequest,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Serves the same snapshot forever, optionally taking a while to answer.
struct SteadySource {
    snapshot: Snapshot,
    latency: Duration,
    fetched_at: Arc<Mutex<Vec<Instant>>>,
    fail_first: bool,
}

impl SteadySource {
    fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            latency: Duration::ZERO,
            fetched_at: Arc::default(),
            fail_first: false,
        }
    }
}

#[async_trait]
impl SnapshotSource for SteadySource {
    async fn fetch(&mut self) -> SyncResult<Option<Snapshot>> {
        self.fetched_at.lock().unwrap().push(Instant::now());
        if self.fail_first {
            self.fail_first = false;
            return Err(SyncError::Source("connection refused".to_string()));
        }
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        Ok(Some(self.snapshot.clone()))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    ticks: Arc<Mutex<Vec<TickOutcome>>>,
    blurred: Arc<Mutex<Vec<FieldId>>>,
    writes: Arc<Mutex<Vec<WriteRequest>>>,
}

#[async_trait]
impl DashboardSink for RecordingSink {
    async fn render(&mut self, outcome: &TickOutcome) {
        self.ticks.lock().unwrap().push(outcome.clone());
    }

    async fn blurred(&mut self, fields: &[FieldId]) {
        self.blurred.lock().unwrap().extend_from_slice(fields);
    }

    async fn write(&mut self, request: WriteRequest) -> SyncResult<()> {
        self.writes.lock().unwrap().push(request);
        Ok(())
    }
}

fn folder(name: &str) -> Snapshot {
    Snapshot::new(json!({ "device": { "settings": { "file": { "folder_name": name } } } }))
}

fn folder_field() -> FieldId {
    FieldId::from("capture-folder-name")
}

fn shows(outcome: &TickOutcome, field: &FieldId) -> bool {
    outcome.updates.iter().any(|u| &u.field == field)
}

#[tokio::test(start_paused = true)]
async fn test_focused_field_released_by_idle_timer() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let sink = RecordingSink::default();

    let handle = poller::spawn(
        controller,
        SteadySource::new(folder("remote")),
        sink.clone(),
        config.poll_interval(),
    );
    handle.send(UiEvent::Focus(folder_field())).unwrap();

    sleep(Duration::from_secs(5)).await;
    assert!(sink.ticks.lock().unwrap().len() > 10);
    assert!(!sink.ticks.lock().unwrap().iter().any(|t| shows(t, &folder_field())));

    sleep(Duration::from_secs(6)).await;
    let released_between_ticks = sink.blurred.lock().unwrap().contains(&folder_field());
    let released_on_tick = sink
        .ticks
        .lock()
        .unwrap()
        .iter()
        .any(|t| t.expired.contains(&folder_field()));
    assert!(released_between_ticks || released_on_tick);
    assert!(sink.ticks.lock().unwrap().iter().any(|t| shows(t, &folder_field())));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_stretches_cadence() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let mut source = SteadySource::new(folder("x"));
    source.latency = Duration::from_millis(100);
    let fetched_at = source.fetched_at.clone();

    let handle = poller::spawn(controller, source, RecordingSink::default(), config.poll_interval());
    sleep(Duration::from_secs(3)).await;
    handle.shutdown().await.unwrap();

    let fetched_at = fetched_at.lock().unwrap();
    assert!(fetched_at.len() >= 5);
    for pair in fetched_at.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(250),
            "requests overlapped: {:?}",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_commit_reaches_backend_writer() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let sink = RecordingSink::default();

    let handle = poller::spawn(
        controller,
        SteadySource::new(folder("old")),
        sink.clone(),
        config.poll_interval(),
    );
    handle
        .send(UiEvent::Commit(folder_field(), FieldValue::from("new_run")))
        .unwrap();
    sleep(Duration::from_millis(500)).await;
    handle.shutdown().await.unwrap();

    let writes = sink.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].path.as_str(), "device/settings/file");
    assert_eq!(writes[0].body(), json!({ "folder_name": "new_run" }));

    // The stale backend value never replaced the edit.
    assert!(!sink.ticks.lock().unwrap().iter().any(|t| shows(t, &folder_field())));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_timers() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let sink = RecordingSink::default();

    let handle = poller::spawn(
        controller,
        SteadySource::new(folder("remote")),
        sink.clone(),
        config.poll_interval(),
    );
    handle.send(UiEvent::Focus(folder_field())).unwrap();
    sleep(Duration::from_secs(1)).await;
    handle.shutdown().await.unwrap();

    let ticks_at_shutdown = sink.ticks.lock().unwrap().len();
    sleep(config.idle_timeout() * 2).await;

    assert_eq!(sink.ticks.lock().unwrap().len(), ticks_at_shutdown);
    assert!(sink.blurred.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_error_skips_tick() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let sink = RecordingSink::default();
    let mut source = SteadySource::new(folder("remote"));
    source.fail_first = true;
    let fetched_at = source.fetched_at.clone();

    let handle = poller::spawn(controller, source, sink.clone(), config.poll_interval());
    sleep(Duration::from_millis(400)).await;
    handle.shutdown().await.unwrap();

    // One failed request, then polling carried on at the normal cadence.
    let fetches = fetched_at.lock().unwrap().len();
    assert!(fetches >= 3, "{fetches} fetches");
    assert_eq!(sink.ticks.lock().unwrap().len(), fetches - 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_after_shutdown_are_rejected() {
    let config = DashboardConfig::default();
    let controller = DashboardController::with_default_bindings(&config);
    let handle = poller::spawn(
        controller,
        SteadySource::new(folder("x")),
        RecordingSink::default(),
        config.poll_interval(),
    );
    let events = handle.events();
    handle.shutdown().await.unwrap();

    assert!(events.send(UiEvent::Blur(folder_field())).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_focus_applied_before_spawn_holds_first_poll() {
    let config = DashboardConfig::default();
    let mut controller = DashboardController::with_default_bindings(&config);
    controller
        .on_event(UiEvent::Focus(folder_field()), Instant::now().into_std())
        .unwrap();
    let sink = RecordingSink::default();

    let handle = poller::spawn(
        controller,
        SteadySource::new(folder("remote")),
        sink.clone(),
        config.poll_interval(),
    );
    sleep(Duration::from_millis(10)).await;
    handle.shutdown().await.unwrap();

    let ticks = sink.ticks.lock().unwrap();
    assert_eq!(ticks.len(), 1);
    assert!(!shows(&ticks[0], &folder_field()));
}
