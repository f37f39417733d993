// Trainwatch - training monitor console
// Main entry point

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use trainwatch::cli;
use trainwatch::config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "trainwatch")]
#[command(about = "Terminal monitor console for ML training backends", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Backend address override (host:port)
    #[arg(long, global = true)]
    backend: Option<String>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Show current training and system status
    Status,
    /// Follow live training progress and logs
    Watch,
    /// Upload a config document and start training from it
    Start {
        /// Path to a JSON training config document
        config: PathBuf,
    },
    /// Stop the running training job
    Stop,
    /// Upload a config document without starting a job
    ConfigPush {
        /// Path to a JSON training config document
        config: PathBuf,
    },
    /// Print a stored config document
    ConfigShow {
        /// Config key returned by start/config-push
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(backend) = args.backend {
        settings.backend.address = backend;
    }

    match args.command {
        Command::Status => cli::run_status(&settings).await,
        Command::Watch => cli::run_watch(&settings).await,
        Command::Start { config } => cli::run_start(&settings, &config).await,
        Command::Stop => cli::run_stop(&settings).await,
        Command::ConfigPush { config } => cli::run_config_push(&settings, &config).await,
        Command::ConfigShow { key } => cli::run_config_show(&settings, &key).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    // Logs go to stderr so they never fight the progress bar on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
