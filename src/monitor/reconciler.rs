// Training state reconciliation
//
// Merges push-channel events and status polls into one authoritative
// snapshot plus two bounded histories (event log, loss curve). The two
// sources race and duplicate freely; the merge rule below is idempotent
// for status fields so arrival order between them does not matter. Log
// and loss history keep strict arrival order.

use serde_json::json;
use tracing::debug;

use crate::backend::events::{BackupPayload, LogPayload, SamplingPayload, StatusPayload};
use crate::monitor::log::{EventLog, LogEntry, LogKind, LossHistory, LossPoint};
use crate::monitor::snapshot::{TrainingProgress, TrainingSnapshot, TrainingStatus};

/// Backend log lines that carry no information and are dropped outright.
const NOISE_MESSAGES: [&str; 2] = ["Training ...", "Training..."];

/// Merge a status payload into the snapshot.
///
/// A delivered status string always wins. A terminal/idle status forces
/// `is_training` to false even when the same payload claims otherwise,
/// because the status label is a stronger signal than a boolean that may
/// lag one event behind a transition. Otherwise a delivered boolean is
/// adopted verbatim; an absent one leaves the flag unchanged.
pub fn merge_status(snapshot: &mut TrainingSnapshot, payload: &StatusPayload) {
    let mut terminal = false;

    if let Some(wire) = payload.status.as_deref() {
        match TrainingStatus::from_wire(wire) {
            Some(status) => {
                snapshot.status = status;
                terminal = status.is_terminal();
            }
            None => debug!(status = %wire, "Ignoring unknown status label"),
        }
    }

    if terminal {
        snapshot.is_training = false;
    } else if let Some(is_training) = payload.is_training {
        snapshot.is_training = is_training;
    }
}

/// Merges push and poll events into a coherent training view-state.
///
/// All handlers are synchronous and run to completion; the async wiring
/// lives in [`crate::monitor::driver`]. State is created when monitoring
/// starts and discarded on teardown, never persisted.
pub struct TrainingStateReconciler {
    snapshot: TrainingSnapshot,
    log: EventLog,
    loss: LossHistory,
    last_epoch: Option<u64>,
}

impl TrainingStateReconciler {
    pub fn new() -> Self {
        Self {
            snapshot: TrainingSnapshot::default(),
            log: EventLog::new(),
            loss: LossHistory::new(),
            last_epoch: None,
        }
    }

    /// Channel (re)connection. An empty payload is a bare handshake and
    /// must not be read as "training stopped".
    pub fn on_connect(&mut self, payload: &StatusPayload) {
        if payload.is_empty() {
            debug!("Push channel connected without state, keeping snapshot");
            return;
        }
        merge_status(&mut self.snapshot, payload);
    }

    /// Pushed job status transition.
    pub fn on_state_update(&mut self, payload: &StatusPayload) {
        merge_status(&mut self.snapshot, payload);
    }

    /// Result of a status poll. Same precedence as a pushed update, so the
    /// two sources can interleave in any order.
    pub fn apply_poll(&mut self, payload: &StatusPayload) {
        merge_status(&mut self.snapshot, payload);
    }

    /// Pushed per-step progress. Updates the progress block, appends
    /// step/epoch log entries, and records a loss point when one is
    /// present. A repeated event for the same step contributes neither a
    /// log entry nor a loss point.
    pub fn on_progress(&mut self, progress: TrainingProgress) {
        if progress.total_epochs > 0 && self.last_epoch != Some(progress.current_epoch) {
            if self.last_epoch.is_some() {
                self.log.push(
                    LogKind::Epoch,
                    format!("epoch {}/{}", progress.current_epoch, progress.total_epochs),
                    None,
                );
            }
            self.last_epoch = Some(progress.current_epoch);
        }

        let detail = json!({
            "loss": progress.loss,
            "smooth_loss": progress.smooth_loss,
            "samples_per_second": progress.samples_per_second,
        });
        let fresh_step = self.log.push_step(
            progress.current_step,
            format!("step {}/{}", progress.current_step, progress.total_steps),
            Some(detail),
        );
        if fresh_step {
            self.loss
                .push(progress.current_step, progress.loss, progress.smooth_loss);
        }

        self.snapshot.progress = Some(progress);
    }

    /// Pushed sampling notification.
    pub fn on_sampling(&mut self, payload: &SamplingPayload) {
        let message = match payload.step {
            Some(step) => format!("sample generated at step {}", step),
            None => "sample generated".to_string(),
        };
        let detail = json!({
            "prompt": payload.prompt,
            "image_path": payload.image_path,
            "step": payload.step,
        });
        self.log.push(LogKind::Sampling, message, Some(detail));
    }

    /// Pushed backup/checkpoint notification.
    pub fn on_backup(&mut self, payload: &BackupPayload) {
        let message = match payload.path.as_deref() {
            Some(path) => format!("backup written: {}", path),
            None => "backup written".to_string(),
        };
        let detail = json!({
            "path": payload.path,
            "reason": payload.reason,
        });
        self.log.push(LogKind::Backup, message, Some(detail));
    }

    /// Pushed backend log line. Known placeholder noise is dropped;
    /// consecutive duplicates are coalesced by the log buffer.
    pub fn on_log(&mut self, payload: &LogPayload) {
        if NOISE_MESSAGES.contains(&payload.message.as_str()) {
            return;
        }
        let kind = match payload.level.as_deref() {
            Some(level) if level.eq_ignore_ascii_case("error") => LogKind::Error,
            _ => LogKind::Info,
        };
        self.log.push(kind, payload.message.clone(), None);
    }

    /// Correction applied when a stop request reports the job was already
    /// not running (HTTP 409 from the control endpoint).
    pub fn mark_stopped(&mut self) {
        self.snapshot.is_training = false;
    }

    /// Reset log and loss history. The status fields are untouched.
    pub fn clear(&mut self) {
        self.log.clear();
        self.loss.clear();
    }

    pub fn snapshot(&self) -> &TrainingSnapshot {
        &self.snapshot
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.to_vec()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn loss_history(&self) -> Vec<LossPoint> {
        self.loss.to_vec()
    }
}

impl Default for TrainingStateReconciler {
    fn default() -> Self {
        Self::new()
    }
}
