//! Reference staleness checks.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::scan::GOAL_EXT;

/// State of a goal's reference artifacts relative to its source file.
///
/// All three outcomes are ordinary; a check never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefStatus {
    /// Every artifact exists and is newer than the source file
    UpToDate,
    /// The source file is newer than at least one artifact
    Stale,
    /// The source file or at least one artifact is absent
    Missing,
}

/// The fixed artifact set for a slug: structured document, full image,
/// thumbnail, vector image.
pub fn reference_paths(slug: &str, ref_dir: &Path) -> [PathBuf; 4] {
    [
        ref_dir.join(format!("{slug}.json")),
        ref_dir.join(format!("{slug}.png")),
        ref_dir.join(format!("{slug}-thumb.png")),
        ref_dir.join(format!("{slug}.svg")),
    ]
}

/// Compare the source file's mtime against every reference artifact.
pub fn check_reference(slug: &str, source_dir: &Path, ref_dir: &Path) -> RefStatus {
    let source = source_dir.join(format!("{slug}.{GOAL_EXT}"));
    let Some(source_mtime) = mtime(&source) else {
        return RefStatus::Missing;
    };

    let mut stale = false;
    for artifact in reference_paths(slug, ref_dir) {
        match mtime(&artifact) {
            Some(artifact_mtime) => {
                if source_mtime > artifact_mtime {
                    stale = true;
                }
            }
            None => return RefStatus::Missing,
        }
    }

    if stale {
        RefStatus::Stale
    } else {
        RefStatus::UpToDate
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
