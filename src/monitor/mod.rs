// Training monitor module
// Merges push-channel events and status polls into one coherent,
// bounded view-state

mod driver;
mod log;
mod reconciler;
mod snapshot;

pub use driver::{Monitor, MonitorHandle, StatusSource, DEFAULT_POLL_INTERVAL};
pub use log::{EventLog, LogEntry, LogKind, LossHistory, LossPoint, HISTORY_LIMIT};
pub use reconciler::{merge_status, TrainingStateReconciler};
pub use snapshot::{TrainingProgress, TrainingSnapshot, TrainingStatus};
