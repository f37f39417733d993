// Training snapshot types
//
// The snapshot is the single coherent view of a training job derived from
// merging push and poll events. It is cheap to clone and is published to
// hosts through a watch channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative job status label reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Idle,
    Starting,
    Training,
    Stopped,
    Completed,
    Error,
}

impl TrainingStatus {
    /// Parse a wire status string. Unknown strings yield `None` so a
    /// malformed payload degrades to a no-op instead of a crash.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "starting" => Some(Self::Starting),
            "training" => Some(Self::Training),
            "stopped" => Some(Self::Stopped),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Terminal or idle states force `is_training` to false regardless of
    /// any boolean delivered in the same payload.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Stopped | Self::Completed | Self::Error
        )
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Training => "training",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// Last known training progress. Absent from the snapshot until the first
/// progress event arrives. This struct doubles as the wire shape of the
/// `progress` push event, so missing fields default instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingProgress {
    #[serde(default)]
    pub current_step: u64,
    #[serde(default)]
    pub total_steps: u64,
    #[serde(default)]
    pub current_epoch: u64,
    #[serde(default)]
    pub total_epochs: u64,
    #[serde(default)]
    pub loss: Option<f64>,
    #[serde(default)]
    pub smooth_loss: Option<f64>,
    #[serde(default)]
    pub elapsed: String,
    #[serde(default)]
    pub remaining: String,
    #[serde(default)]
    pub samples_per_second: Option<f64>,
}

/// Merged view-state of the monitored training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSnapshot {
    pub is_training: bool,
    pub status: TrainingStatus,
    pub progress: Option<TrainingProgress>,
}

impl Default for TrainingSnapshot {
    fn default() -> Self {
        Self {
            is_training: false,
            status: TrainingStatus::Idle,
            progress: None,
        }
    }
}
