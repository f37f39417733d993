// One-shot CLI commands
//
// Each command builds a client from settings, performs one request, and
// prints a human-readable result. Job control failures surface the
// backend's detail text inline; nothing here is fatal to the backend.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::backend::{config_key, BackendClient, BackendError, StopOutcome};
use crate::config::Settings;
use crate::errors::{connection_refused_error, job_request_failed};
use crate::monitor::TrainingStatus;

fn client(settings: &Settings) -> Result<BackendClient> {
    BackendClient::new(&settings.backend.address, settings.backend.timeout_seconds)
        .context("Failed to build backend client")
}

fn fail(settings: &Settings, action: &str, error: BackendError) -> anyhow::Error {
    if error.is_connect() {
        anyhow::anyhow!("{}", connection_refused_error(&settings.backend.address))
    } else {
        anyhow::anyhow!("{}", job_request_failed(action, &error.user_message()))
    }
}

/// Show current training and system status.
pub async fn run_status(settings: &Settings) -> Result<()> {
    let client = client(settings)?;

    let status = match client.fetch_status().await {
        Ok(status) => status,
        Err(e) if e.is_connect() => {
            bail!("{}", connection_refused_error(&settings.backend.address))
        }
        Err(e) => bail!("Status request failed: {}", e.user_message()),
    };

    let label = status
        .status
        .as_deref()
        .and_then(TrainingStatus::from_wire)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let training = if status.is_training.unwrap_or(false) {
        "yes"
    } else {
        "no"
    };

    println!("status:   {}", label);
    println!("training: {}", training);

    // System metrics are best-effort; old backends may not expose them
    if let Ok(system) = client.system_status().await {
        for gpu in &system.gpus {
            println!(
                "gpu:      {} ({:.0}% memory{})",
                gpu.name,
                gpu.memory_percent(),
                gpu.temperature
                    .map(|t| format!(", {}°C", t))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Upload a config document and start training from it.
pub async fn run_start(settings: &Settings, config: &Path) -> Result<()> {
    let client = client(settings)?;
    let document = read_config_document(config)?;
    let key = config_key(&document);

    client
        .save_config(&key, &document)
        .await
        .map_err(|e| fail(settings, "start", e))?;
    client
        .start_training(&key)
        .await
        .map_err(|e| fail(settings, "start", e))?;

    println!("Training start requested (config {})", key);
    Ok(())
}

/// Stop the running training job.
pub async fn run_stop(settings: &Settings) -> Result<()> {
    let client = client(settings)?;

    match client.stop_training().await {
        Ok(StopOutcome::Stopped) => {
            println!("Training stop requested");
            Ok(())
        }
        Ok(StopOutcome::NotRunning) => {
            println!("No training job was running");
            Ok(())
        }
        Err(e) => Err(fail(settings, "stop", e)),
    }
}

/// Upload a config document without starting a job.
pub async fn run_config_push(settings: &Settings, config: &Path) -> Result<()> {
    let client = client(settings)?;
    let document = read_config_document(config)?;
    let key = config_key(&document);

    client
        .save_config(&key, &document)
        .await
        .map_err(|e| fail(settings, "configure", e))?;

    println!("Config stored as {}", key);
    Ok(())
}

/// Print a stored config document.
pub async fn run_config_show(settings: &Settings, key: &str) -> Result<()> {
    let client = client(settings)?;
    let document = client
        .load_config(key)
        .await
        .map_err(|e| fail(settings, "configure", e))?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn read_config_document(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid JSON config document", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model_type": "sdxl"}"#).unwrap();

        let document = read_config_document(&path).unwrap();
        assert_eq!(document["model_type"], "sdxl");

        std::fs::write(&path, "not json").unwrap();
        assert!(read_config_document(&path).is_err());
    }
}
