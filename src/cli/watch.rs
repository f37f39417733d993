// Live watch view
//
// Wires the push channel and status poll into a monitor, then renders
// log entries and a progress bar until Ctrl-C. Teardown deregisters all
// push listeners and stops the poll loop before returning.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{BackendClient, PushChannel};
use crate::config::Settings;
use crate::monitor::{Monitor, MonitorHandle, TrainingSnapshot};

const RENDER_PERIOD: Duration = Duration::from_millis(500);

/// Follow live training progress and logs.
pub async fn run_watch(settings: &Settings) -> Result<()> {
    let client = Arc::new(
        BackendClient::new(&settings.backend.address, settings.backend.timeout_seconds)
            .context("Failed to build backend client")?,
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut push = PushChannel::new(client.ws_url());
    push.subscribe_all(&event_tx);
    if let Err(e) = push.connect().await {
        // The poll loop keeps the view alive without the push channel
        warn!(error = %e, "Push channel unavailable, relying on status polls");
    }

    let (monitor, handle) = Monitor::new(
        client.clone(),
        event_rx,
        settings.monitor.poll_interval(),
    );
    let monitor_task = tokio::spawn(monitor.run());

    render_loop(
        &handle,
        &client,
        settings.monitor.system_poll_interval(),
    )
    .await;

    push.unsubscribe_all();
    push.disconnect().await;
    handle.shutdown();
    monitor_task.await.context("Monitor task panicked")?;

    Ok(())
}

async fn render_loop(
    handle: &MonitorHandle,
    client: &Arc<BackendClient>,
    system_interval: Duration,
) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{prefix} {bar:32} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut next_log_id: u64 = 0;
    let mut render = tokio::time::interval(RENDER_PERIOD);
    let mut system = tokio::time::interval(system_interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                bar.finish_and_clear();
                println!("Stopping watch");
                return;
            }

            _ = render.tick() => {
                for entry in handle.log_entries().await {
                    if entry.id < next_log_id {
                        continue;
                    }
                    bar.println(format!(
                        "{} [{}] {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.kind,
                        entry.message
                    ));
                    next_log_id = entry.id + 1;
                }
                draw_snapshot(&bar, &handle.snapshot());
            }

            _ = system.tick() => {
                match client.system_status().await {
                    Ok(system) => {
                        if let Some(gpu) = system.gpus.first() {
                            bar.set_prefix(format!(
                                "[gpu {:.0}%{}]",
                                gpu.memory_percent(),
                                gpu.temperature
                                    .map(|t| format!(" {}°C", t))
                                    .unwrap_or_default()
                            ));
                        }
                    }
                    // Transient failures keep the last reading
                    Err(e) => debug!(error = %e, "System status poll failed"),
                }
            }
        }
    }
}

fn draw_snapshot(bar: &ProgressBar, snapshot: &TrainingSnapshot) {
    match &snapshot.progress {
        Some(progress) => {
            bar.set_length(progress.total_steps.max(progress.current_step));
            bar.set_position(progress.current_step);

            let loss = progress
                .smooth_loss
                .or(progress.loss)
                .map(|l| format!(" loss {:.4}", l))
                .unwrap_or_default();
            bar.set_message(format!("{}{}", snapshot.status, loss));
        }
        None => bar.set_message(snapshot.status.to_string()),
    }
}
