// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::load_settings;
pub use settings::{BackendSettings, MonitorSettings, Settings};
