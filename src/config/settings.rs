// Configuration structs

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,
}

/// Where the training backend lives.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    /// Backend address (e.g., "127.0.0.1:8090")
    #[serde(default = "default_address")]
    pub address: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Poll cadence for the monitor loop.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Training-status poll period in seconds
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,

    /// System/GPU metrics poll period in seconds
    #[serde(default = "default_poll_secs")]
    pub system_poll_interval_secs: u64,
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn system_poll_interval(&self) -> Duration {
        Duration::from_secs(self.system_poll_interval_secs.max(1))
    }
}

fn default_address() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_poll_secs() -> u64 {
    5
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
            system_poll_interval_secs: default_poll_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.backend.address, "127.0.0.1:8090");
        assert_eq!(settings.monitor.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_poll_interval_floor() {
        let monitor = MonitorSettings {
            poll_interval_secs: 0,
            system_poll_interval_secs: 0,
        };
        assert_eq!(monitor.poll_interval(), Duration::from_secs(1));
    }
}
