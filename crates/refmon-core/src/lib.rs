//! Refmon Core - Continuous regression monitoring for goal documents
//!
//! This crate contains all the core functionality for refmon, including:
//! - Goal directory scanning and sweep ordering (scan)
//! - Reference artifact checking (reference)
//! - Document and graph comparison (diff)
//! - The computation-service client (service)
//! - The problem registry (problems)
//! - The job pipeline: watcher, dispatcher and worker (jobs)

pub mod config;
pub mod cues;
pub mod diff;
pub mod jobs;
pub mod problems;
pub mod reference;
pub mod scan;
pub mod service;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::MonitorConfig;
pub use jobs::{Dispatcher, MonitorState, OperatorCommand};
pub use service::{ComputeService, HttpComputeService};

/// Dispatcher scheduling interval. Ticks are cheap when nothing happened;
/// this bounds how quickly the monitor reacts to changes and responses.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Run the monitor until `cancel` fires or the operator quits.
///
/// Wires up the worker, the file watcher, the cue player and the
/// dispatcher, then drives the dispatcher on a fixed tick. Shutdown is
/// orderly: the worker drains its queue up to the quit sentinel and is
/// joined before this returns.
pub async fn run_monitor(
    config: MonitorConfig,
    service: Arc<dyn ComputeService>,
    commands_rx: mpsc::UnboundedReceiver<OperatorCommand>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    config.ensure_dirs()?;

    let graph_enabled = Arc::new(AtomicBool::new(config.graph));
    let (pending_tx, completed_rx, worker) = jobs::spawn_worker(service, graph_enabled.clone());
    let (watcher, changes_rx) = jobs::ChangeWatcher::spawn(&config)?;
    let (cues_tx, cues_rx) = mpsc::unbounded_channel();
    let cue_player = cues::spawn_cue_player(
        cues_rx,
        config.regression_sound.clone(),
        config.all_clear_sound.clone(),
    );

    tracing::info!(
        goal_dir = %config.goal_dir.display(),
        service = %config.service_url,
        "monitor started"
    );

    let mut dispatcher = Dispatcher::new(
        config,
        changes_rx,
        commands_rx,
        pending_tx,
        completed_rx,
        cues_tx,
        graph_enabled,
    );

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                dispatcher.request_quit();
            }
            _ = ticker.tick() => {}
        }
        dispatcher.tick();
        if dispatcher.is_exiting() {
            break;
        }
    }

    // Stop producing changes, let the worker drain up to the sentinel
    drop(watcher);
    worker.await?;
    drop(dispatcher);
    cue_player.await?;

    tracing::info!("monitor stopped");
    Ok(())
}
