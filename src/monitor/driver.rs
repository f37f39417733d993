// Monitor driver
//
// Owns the reconciler and runs the event loop that merges push-channel
// events with periodic status polls. Hosts observe state through a watch
// channel plus a cloneable handle; teardown goes through a cancellation
// token so no state is mutated after shutdown.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::events::{BackendEvent, StatusPayload};
use crate::monitor::log::{LogEntry, LossPoint};
use crate::monitor::reconciler::TrainingStateReconciler;
use crate::monitor::snapshot::TrainingSnapshot;

/// Seam over the status poll endpoint so the driver can be exercised
/// without a network dependency.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn poll_status(&self) -> Result<StatusPayload>;
}

/// Default training-status poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Event loop merging push events and status polls into the reconciler.
pub struct Monitor {
    state: Arc<RwLock<TrainingStateReconciler>>,
    snapshot_tx: Arc<watch::Sender<TrainingSnapshot>>,
    events: mpsc::UnboundedReceiver<BackendEvent>,
    status: Arc<dyn StatusSource>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

/// Cloneable host-facing view of a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    state: Arc<RwLock<TrainingStateReconciler>>,
    snapshot_tx: Arc<watch::Sender<TrainingSnapshot>>,
    snapshot_rx: watch::Receiver<TrainingSnapshot>,
    cancel: CancellationToken,
}

impl Monitor {
    /// Create a monitor fed by `events`, polling `status` on the given
    /// period. The returned handle stays valid for the monitor's lifetime.
    pub fn new(
        status: Arc<dyn StatusSource>,
        events: mpsc::UnboundedReceiver<BackendEvent>,
        poll_interval: Duration,
    ) -> (Self, MonitorHandle) {
        let state = Arc::new(RwLock::new(TrainingStateReconciler::new()));
        let (snapshot_tx, snapshot_rx) = watch::channel(TrainingSnapshot::default());
        let snapshot_tx = Arc::new(snapshot_tx);
        let cancel = CancellationToken::new();

        let handle = MonitorHandle {
            state: state.clone(),
            snapshot_tx: snapshot_tx.clone(),
            snapshot_rx,
            cancel: cancel.clone(),
        };

        (
            Self {
                state,
                snapshot_tx,
                events,
                status,
                poll_interval,
                cancel,
            },
            handle,
        )
    }

    /// Run until cancelled. The first poll fires immediately, then on the
    /// configured period. Polling continues even if the push channel dies,
    /// so the view degrades gracefully rather than freezing.
    pub async fn run(mut self) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut push_open = true;

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                maybe_event = self.events.recv(), if push_open => {
                    match maybe_event {
                        Some(event) => self.apply_event(event).await,
                        None => {
                            debug!("Push event channel closed, continuing with polls only");
                            push_open = false;
                        }
                    }
                }

                _ = poll.tick() => self.poll_once().await,
            }
        }

        info!("Monitor stopped");
    }

    async fn apply_event(&self, event: BackendEvent) {
        let mut state = self.state.write().await;
        match event {
            BackendEvent::Connected(payload) => state.on_connect(&payload),
            BackendEvent::TrainingState(payload) => state.on_state_update(&payload),
            BackendEvent::Progress(progress) => state.on_progress(progress),
            BackendEvent::Sampling(payload) => state.on_sampling(&payload),
            BackendEvent::Backup(payload) => state.on_backup(&payload),
            BackendEvent::Log(payload) => state.on_log(&payload),
        }
        self.snapshot_tx.send_replace(state.snapshot().clone());
    }

    /// One status poll. A failed poll never propagates: the last snapshot
    /// is retained until the next successful poll or push event.
    async fn poll_once(&self) {
        match self.status.poll_status().await {
            Ok(payload) => {
                let mut state = self.state.write().await;
                state.apply_poll(&payload);
                self.snapshot_tx.send_replace(state.snapshot().clone());
            }
            Err(e) => debug!(error = %e, "Status poll failed, keeping last snapshot"),
        }
    }
}

impl MonitorHandle {
    /// Current merged snapshot.
    pub fn snapshot(&self) -> TrainingSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch receiver that yields a fresh snapshot after every applied event.
    pub fn subscribe(&self) -> watch::Receiver<TrainingSnapshot> {
        self.snapshot_rx.clone()
    }

    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.state.read().await.log_entries()
    }

    pub async fn loss_history(&self) -> Vec<LossPoint> {
        self.state.read().await.loss_history()
    }

    /// Reset log and loss history without touching the status fields.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.clear();
        self.snapshot_tx.send_replace(state.snapshot().clone());
    }

    /// Correct the training flag after a stop request reported the job was
    /// already not running.
    pub async fn mark_stopped(&self) {
        let mut state = self.state.write().await;
        state.mark_stopped();
        self.snapshot_tx.send_replace(state.snapshot().clone());
    }

    /// Stop the monitor loop. Idempotent; pending poll results are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::snapshot::TrainingStatus;

    struct StaticSource(StatusPayload);

    #[async_trait]
    impl StatusSource for StaticSource {
        async fn poll_status(&self) -> Result<StatusPayload> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl StatusSource for FailingSource {
        async fn poll_status(&self) -> Result<StatusPayload> {
            anyhow::bail!("backend unreachable")
        }
    }

    #[tokio::test]
    async fn test_poll_updates_snapshot() {
        let source = Arc::new(StaticSource(StatusPayload {
            is_training: Some(true),
            status: Some("training".to_string()),
        }));
        let (_tx, rx) = mpsc::unbounded_channel();
        let (monitor, handle) = Monitor::new(source, rx, Duration::from_millis(10));
        let task = tokio::spawn(monitor.run());

        let mut snapshots = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(1), snapshots.changed())
            .await
            .expect("snapshot update")
            .unwrap();

        assert_eq!(handle.snapshot().status, TrainingStatus::Training);
        assert!(handle.snapshot().is_training);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_poll_retains_snapshot() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (monitor, handle) =
            Monitor::new(Arc::new(FailingSource), rx, Duration::from_millis(5));
        let task = tokio::spawn(monitor.run());

        // Seed state through the push side, then let several polls fail
        tx.send(BackendEvent::TrainingState(StatusPayload {
            is_training: Some(true),
            status: Some("training".to_string()),
        }))
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, TrainingStatus::Training);
        assert!(snapshot.is_training);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_push_channel_close_keeps_polling() {
        let source = Arc::new(StaticSource(StatusPayload {
            is_training: None,
            status: Some("completed".to_string()),
        }));
        let (tx, rx) = mpsc::unbounded_channel();
        let (monitor, handle) = Monitor::new(source, rx, Duration::from_millis(5));
        let task = tokio::spawn(monitor.run());

        drop(tx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Polls kept flowing after the push side went away
        assert_eq!(handle.snapshot().status, TrainingStatus::Completed);

        handle.shutdown();
        task.await.unwrap();
    }
}
