// Backend collaborators
// HTTP poll/control client and WebSocket push channel

pub mod client;
pub mod events;
pub mod push;

pub use client::{config_key, BackendClient, BackendError, GpuStatus, StopOutcome, SystemStatus};
pub use events::{
    BackendEvent, BackupPayload, LogPayload, SamplingPayload, StatusPayload, EVENT_NAMES,
};
pub use push::PushChannel;
