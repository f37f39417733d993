// CLI module
// Public interface for command-line interface

mod commands;
mod watch;

pub use commands::{run_config_push, run_config_show, run_start, run_status, run_stop};
pub use watch::run_watch;
