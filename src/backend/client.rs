// Backend HTTP client
//
// Covers the poll and control surface of the training backend: status
// polls, system/GPU metrics, job start/stop, and the opaque config
// document store. The push channel lives in `backend::push`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::events::StatusPayload;
use crate::monitor::StatusSource;

/// Typed error for backend requests.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Api { status: StatusCode, detail: String },
}

impl BackendError {
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    /// Inline message for the user: the server-provided detail when
    /// available, a generic fallback otherwise.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { detail, .. } if !detail.is_empty() => detail.clone(),
            Self::Api { status, .. } => format!("request failed with status {}", status),
            Self::Transport(_) => "could not reach the training backend".to_string(),
        }
    }
}

/// Result of a stop request. A 409 means the job was already not running
/// and is reported as an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// One GPU as reported by the system endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memory_used: u64,
    #[serde(default)]
    pub memory_total: u64,
    #[serde(default)]
    pub utilization: Option<u32>,
    #[serde(default)]
    pub temperature: Option<u32>,
}

impl GpuStatus {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_total as f64 * 100.0
        }
    }
}

/// Host/GPU metrics polled for the dashboard view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub gpus: Vec<GpuStatus>,
    #[serde(default)]
    pub ram_used: Option<u64>,
    #[serde(default)]
    pub ram_total: Option<u64>,
}

/// Content-addressed key for a config document, used as the serialized
/// config reference handed to the start endpoint.
pub fn config_key(document: &serde_json::Value) -> String {
    let serialized = document.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

/// HTTP client for the training backend.
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    /// Create a client for `address` (host:port).
    pub fn new(address: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: format!("http://{}", address),
            client,
        })
    }

    /// Create a client for a full base URL (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL of the push channel.
    pub fn ws_url(&self) -> String {
        let ws_base = if self.base_url.starts_with("https://") {
            self.base_url.replace("https://", "wss://")
        } else {
            self.base_url.replace("http://", "ws://")
        };
        format!("{}/api/events", ws_base)
    }

    /// One status poll. Idempotent, safe to call on a fixed interval.
    pub async fn fetch_status(&self) -> Result<StatusPayload, BackendError> {
        let url = format!("{}/api/status", self.base_url);
        debug!(url = %url, "Polling training status");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Host/GPU metrics for the dashboard.
    pub async fn system_status(&self) -> Result<SystemStatus, BackendError> {
        let url = format!("{}/api/system", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Start a training job from a stored config document.
    ///
    /// Fire-and-forget: success only means the backend accepted the
    /// request. Actual state changes arrive through push/poll events.
    pub async fn start_training(&self, config_key: &str) -> Result<(), BackendError> {
        let url = format!("{}/api/train/start", self.base_url);
        info!(config_key = %config_key, "Requesting training start");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "config_key": config_key }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    /// Stop the running job. A 409 maps to `StopOutcome::NotRunning` so
    /// callers can correct their local flag instead of showing an error.
    pub async fn stop_training(&self) -> Result<StopOutcome, BackendError> {
        let url = format!("{}/api/train/stop", self.base_url);
        info!("Requesting training stop");

        let response = self.client.post(&url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(StopOutcome::Stopped),
            StatusCode::CONFLICT => {
                info!("Stop request: no job running");
                Ok(StopOutcome::NotRunning)
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    /// Store an opaque config document under `key`.
    pub async fn save_config(
        &self,
        key: &str,
        document: &serde_json::Value,
    ) -> Result<(), BackendError> {
        let url = format!("{}/api/config/{}", self.base_url, key);
        let response = self.client.put(&url).json(document).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    /// Fetch a stored config document.
    pub async fn load_config(&self, key: &str) -> Result<serde_json::Value, BackendError> {
        let url = format!("{}/api/config/{}", self.base_url, key);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Build an API error from a non-success response, preferring the
    /// server's `detail` field over the raw body.
    async fn api_error(response: reqwest::Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .and_then(|d| d.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        BackendError::Api { status, detail }
    }
}

#[async_trait]
impl StatusSource for BackendClient {
    async fn poll_status(&self) -> Result<StatusPayload> {
        Ok(self.fetch_status().await?)
    }
}
