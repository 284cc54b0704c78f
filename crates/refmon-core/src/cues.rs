//! Audio cues for regressions and clean sweeps, plus the external image
//! viewer used to inspect composite diff images.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tokio::sync::mpsc;

/// Operator-audible events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// A fresh regression was detected
    Regression,
    /// A sweep finished with an empty problem registry
    AllClear,
}

/// Candidate player binaries; first one present wins.
const PLAYERS: &[&str] = &["/usr/bin/play", "/usr/bin/afplay"];

fn find_player() -> Option<&'static str> {
    PLAYERS.iter().copied().find(|p| Path::new(p).exists())
}

/// Candidate image viewers; first one present wins.
const VIEWERS: &[&str] = &["/usr/bin/xdg-open", "/usr/bin/open", "/usr/bin/display"];

/// Open an image in the platform viewer, fire-and-forget.
pub fn open_image(path: &Path) {
    let Some(viewer) = VIEWERS.iter().copied().find(|v| Path::new(v).exists()) else {
        tracing::warn!(path = %path.display(), "no image viewer found");
        return;
    };
    match std::process::Command::new(viewer).arg(path).spawn() {
        Ok(_) => tracing::info!(viewer, path = %path.display(), "opened diff image"),
        Err(e) => tracing::warn!(viewer, error = %e, "could not open diff image"),
    }
}

/// Spawns the cue-player task.
///
/// Playback is fire-and-forget; a missing player or sound file downgrades
/// cues to log lines.
pub fn spawn_cue_player(
    mut rx: mpsc::UnboundedReceiver<Cue>,
    regression_sound: Option<PathBuf>,
    all_clear_sound: Option<PathBuf>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let player = find_player();
        while let Some(cue) = rx.recv().await {
            tracing::info!(?cue, "cue");
            let sound = match cue {
                Cue::Regression => regression_sound.as_ref(),
                Cue::AllClear => all_clear_sound.as_ref(),
            };
            let (Some(player), Some(sound)) = (player, sound) else {
                continue;
            };
            match Command::new(player).arg(sound).output().await {
                Ok(output) if !output.status.success() => {
                    tracing::warn!(player, sound = %sound.display(), "cue playback failed");
                }
                Err(e) => {
                    tracing::warn!(player, error = %e, "could not run cue player");
                }
                Ok(_) => {}
            }
        }
    })
}
