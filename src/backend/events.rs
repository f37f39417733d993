// Push channel event payloads
//
// Each WebSocket text frame carries one envelope: {"event": name, "data": {...}}.
// Payload fields are all defaulted so an unexpected shape degrades to a
// no-op update instead of an error.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::monitor::TrainingProgress;

/// Event names delivered by the backend push channel.
pub const EVENT_NAMES: [&str; 6] = [
    "connected",
    "training_state",
    "progress",
    "sampling",
    "backup",
    "log",
];

/// Job status payload, shared by the `connected` and `training_state`
/// events and by the status poll endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub is_training: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

impl StatusPayload {
    /// A reconnect handshake may carry no state at all. Such payloads are
    /// ignored rather than treated as "training stopped".
    pub fn is_empty(&self) -> bool {
        self.is_training.is_none() && self.status.is_none()
    }
}

/// Payload of the `sampling` event (a sample image was generated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingPayload {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub step: Option<u64>,
}

/// Payload of the `backup` event (a checkpoint/backup was written).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of the `log` event (one backend log line).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogPayload {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// A decoded push-channel event.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Connected(StatusPayload),
    TrainingState(StatusPayload),
    Progress(TrainingProgress),
    Sampling(SamplingPayload),
    Backup(BackupPayload),
    Log(LogPayload),
}

impl BackendEvent {
    /// The envelope event name this variant was decoded from.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::TrainingState(_) => "training_state",
            Self::Progress(_) => "progress",
            Self::Sampling(_) => "sampling",
            Self::Backup(_) => "backup",
            Self::Log(_) => "log",
        }
    }

    /// Decode one text frame. Returns `None` for unknown event names or
    /// malformed frames, which are logged and skipped.
    pub fn parse(frame: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            event: String,
            #[serde(default)]
            data: serde_json::Value,
        }

        let envelope: Envelope = match serde_json::from_str(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Discarding malformed push frame");
                return None;
            }
        };

        // A null data field still counts as an (empty) payload.
        let data = if envelope.data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            envelope.data
        };

        let event = match envelope.event.as_str() {
            "connected" => Self::Connected(serde_json::from_value(data).ok()?),
            "training_state" => Self::TrainingState(serde_json::from_value(data).ok()?),
            "progress" => Self::Progress(serde_json::from_value(data).ok()?),
            "sampling" => Self::Sampling(serde_json::from_value(data).ok()?),
            "backup" => Self::Backup(serde_json::from_value(data).ok()?),
            "log" => Self::Log(serde_json::from_value(data).ok()?),
            other => {
                warn!(event = %other, "Ignoring unknown push event");
                return None;
            }
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_training_state() {
        let event =
            BackendEvent::parse(r#"{"event":"training_state","data":{"status":"training","is_training":true}}"#)
                .unwrap();
        match event {
            BackendEvent::TrainingState(payload) => {
                assert_eq!(payload.status.as_deref(), Some("training"));
                assert_eq!(payload.is_training, Some(true));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_progress() {
        let event = BackendEvent::parse(
            r#"{"event":"progress","data":{"current_step":3,"total_steps":10,"loss":0.5}}"#,
        )
        .unwrap();
        match event {
            BackendEvent::Progress(progress) => {
                assert_eq!(progress.current_step, 3);
                assert_eq!(progress.loss, Some(0.5));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_connected_without_data() {
        let event = BackendEvent::parse(r#"{"event":"connected"}"#).unwrap();
        match event {
            BackendEvent::Connected(payload) => assert!(payload.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BackendEvent::parse("not json").is_none());
        assert!(BackendEvent::parse(r#"{"event":"unknown_event","data":{}}"#).is_none());
    }

    #[test]
    fn test_status_payload_empty() {
        assert!(StatusPayload::default().is_empty());
        let payload = StatusPayload {
            is_training: Some(false),
            status: None,
        };
        assert!(!payload.is_empty());
    }
}
