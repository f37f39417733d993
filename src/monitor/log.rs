// Bounded event log and loss history
//
// Both buffers keep the most recent HISTORY_LIMIT entries, evicting oldest
// first. Entry ids are monotonic and never reused, including across clear().

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum retained entries per buffer.
pub const HISTORY_LIMIT: usize = 500;

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Step,
    Epoch,
    Sampling,
    Backup,
    Info,
    Error,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Step => "step",
            Self::Epoch => "epoch",
            Self::Sampling => "sampling",
            Self::Backup => "backup",
            Self::Info => "info",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// One entry in the training event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
    /// Structured payload matching `kind` (sampling prompt, backup path, ...)
    pub detail: Option<serde_json::Value>,
}

/// Append-only bounded log with consecutive-duplicate coalescing.
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
    capacity: usize,
    /// Step number of the last entry, when that entry is a `Step`.
    last_step: Option<u64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            next_id: 0,
            capacity,
            last_step: None,
        }
    }

    /// Append an entry, coalescing consecutive duplicate info/error
    /// messages. Returns true if the entry was kept.
    pub fn push(
        &mut self,
        kind: LogKind,
        message: String,
        detail: Option<serde_json::Value>,
    ) -> bool {
        if matches!(kind, LogKind::Info | LogKind::Error) {
            if let Some(last) = self.entries.back() {
                if last.kind == kind && last.message == message {
                    return false;
                }
            }
        }
        self.insert(kind, message, detail);
        self.last_step = None;
        true
    }

    /// Append a step entry, coalescing consecutive entries for the same
    /// step. Only the first entry received for a given step survives.
    pub fn push_step(
        &mut self,
        step: u64,
        message: String,
        detail: Option<serde_json::Value>,
    ) -> bool {
        if self.last_step == Some(step) {
            return false;
        }
        self.insert(LogKind::Step, message, detail);
        self.last_step = Some(step);
        true
    }

    fn insert(&mut self, kind: LogKind, message: String, detail: Option<serde_json::Value>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(LogEntry {
            id,
            timestamp: Utc::now(),
            kind,
            message,
            detail,
        });
    }

    /// Discard all entries. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_step = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// One point of loss history, keyed by training step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LossPoint {
    pub step: u64,
    pub loss: Option<f64>,
    pub smooth_loss: Option<f64>,
}

/// Bounded loss history window.
pub struct LossHistory {
    points: VecDeque<LossPoint>,
    capacity: usize,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a point. Skipped entirely when neither loss value is present.
    pub fn push(&mut self, step: u64, loss: Option<f64>, smooth_loss: Option<f64>) -> bool {
        if loss.is_none() && smooth_loss.is_none() {
            return false;
        }
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(LossPoint {
            step,
            loss,
            smooth_loss,
        });
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_vec(&self) -> Vec<LossPoint> {
        self.points.iter().copied().collect()
    }
}

impl Default for LossHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_eviction_keeps_most_recent() {
        let mut log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.push(LogKind::Info, format!("msg {}", i), None);
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_log_ids_strictly_increase() {
        let mut log = EventLog::with_capacity(2);
        log.push(LogKind::Info, "a".to_string(), None);
        log.push(LogKind::Info, "b".to_string(), None);
        log.push(LogKind::Info, "c".to_string(), None);
        let ids: Vec<u64> = log.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_ids_keep_increasing_after_clear() {
        let mut log = EventLog::new();
        log.push(LogKind::Info, "a".to_string(), None);
        log.clear();
        log.push(LogKind::Info, "b".to_string(), None);
        assert_eq!(log.iter().next().unwrap().id, 1);
    }

    #[test]
    fn test_consecutive_duplicate_info_coalesced() {
        let mut log = EventLog::new();
        assert!(log.push(LogKind::Info, "saving".to_string(), None));
        assert!(!log.push(LogKind::Info, "saving".to_string(), None));
        assert!(log.push(LogKind::Info, "saved".to_string(), None));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_duplicate_across_kinds_not_coalesced() {
        let mut log = EventLog::new();
        assert!(log.push(LogKind::Info, "disk full".to_string(), None));
        assert!(log.push(LogKind::Error, "disk full".to_string(), None));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_consecutive_same_step_coalesced() {
        let mut log = EventLog::new();
        assert!(log.push_step(1, "step 1/10".to_string(), None));
        assert!(!log.push_step(1, "step 1/10".to_string(), None));
        assert!(log.push_step(2, "step 2/10".to_string(), None));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_step_dedup_broken_by_interleaved_entry() {
        let mut log = EventLog::new();
        log.push_step(1, "step 1/10".to_string(), None);
        log.push(LogKind::Info, "checkpoint".to_string(), None);
        assert!(log.push_step(1, "step 1/10".to_string(), None));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_loss_history_requires_a_value() {
        let mut history = LossHistory::new();
        assert!(!history.push(1, None, None));
        assert!(history.push(2, Some(0.5), None));
        assert!(history.push(3, None, Some(0.4)));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_loss_history_eviction() {
        let mut history = LossHistory::with_capacity(2);
        history.push(1, Some(0.9), None);
        history.push(2, Some(0.8), None);
        history.push(3, Some(0.7), None);
        let steps: Vec<u64> = history.to_vec().iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![2, 3]);
    }
}
