// Configuration loader
// Loads settings from ~/.trainwatch/config.toml with environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::settings::Settings;

/// Load settings from the config file, falling back to defaults when no
/// file exists. `TRAINWATCH_BACKEND` overrides the backend address either
/// way.
pub fn load_settings() -> Result<Settings> {
    let mut settings = match config_path() {
        Some(path) if path.exists() => read_settings(&path)?,
        _ => Settings::default(),
    };

    if let Ok(address) = std::env::var("TRAINWATCH_BACKEND") {
        if !address.is_empty() {
            settings.backend.address = address;
        }
    }

    Ok(settings)
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".trainwatch/config.toml"))
}

fn read_settings(path: &PathBuf) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str(&contents).with_context(|| {
        format!(
            "Failed to parse {}\n\n\
            \x1b[1;32mTry:\x1b[0m\n\
            1. Check the file for TOML syntax errors\n\
            2. Back it up and start fresh:\n\
               \x1b[36mmv {} {}.backup\x1b[0m",
            path.display(),
            path.display(),
            path.display()
        )
    })
}
