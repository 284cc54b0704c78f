//! File-change detection.
//!
//! Bridges `notify` events into a channel of classified changes. The
//! classification happens on the watcher's thread; reacting to it is the
//! dispatcher's job, which drains the channel once per tick. The channel
//! handoff is what keeps the notification thread and the main loop from
//! sharing mutable flags.

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::MonitorConfig;
use crate::scan::GOAL_EXT;

/// A classified file-system change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A goal file was edited; carries the slug
    GoalEdited(String),
    /// Something else in a watched directory changed
    SourceChanged,
}

/// Decide what a changed path means, if anything.
///
/// Ignored outright: paths under the monitor's own output directories (so
/// it never reacts to its own writes), editor swap/backup files and hidden
/// files.
pub fn classify(path: &Path, config: &MonitorConfig) -> Option<Change> {
    if config.is_own_output(path) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.')
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp")
    {
        return None;
    }
    if path.extension().and_then(|e| e.to_str()) == Some(GOAL_EXT) {
        let slug = path.file_stem()?.to_str()?.to_string();
        return Some(Change::GoalEdited(slug));
    }
    Some(Change::SourceChanged)
}

/// Watches the goal directory and any extra source directories,
/// non-recursively.
pub struct ChangeWatcher {
    // Watching stops when this is dropped
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Start watching. Classified changes arrive on the returned channel.
    pub fn spawn(
        config: &MonitorConfig,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<Change>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let classify_config = config.clone();

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        if !event.kind.is_modify() && !event.kind.is_create() {
                            return;
                        }
                        for path in &event.paths {
                            if let Some(change) = classify(path, &classify_config) {
                                // Send failure means we are shutting down
                                let _ = tx.send(change);
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "file watch error"),
                }
            })?;

        watcher.watch(&config.goal_dir, RecursiveMode::NonRecursive)?;
        for dir in &config.watch_dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!(dir = %dir.display(), "watching source directory");
        }

        Ok((Self { _watcher: watcher }, rx))
    }
}
