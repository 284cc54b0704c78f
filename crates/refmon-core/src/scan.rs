//! Goal discovery and sweep ordering.

use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

/// Extension of goal-definition files.
pub const GOAL_EXT: &str = "bb";

/// List the goal slugs in `dir`, most recently modified first.
///
/// Only plain files with the goal extension directly inside `dir` count;
/// the slug is the file stem. An unreadable directory yields an empty list.
pub fn scan_goals(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut goals: Vec<(String, SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(GOAL_EXT) {
            continue;
        }
        let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        goals.push((slug.to_string(), mtime));
    }

    goals.sort_by(|a, b| b.1.cmp(&a.1));
    goals.into_iter().map(|(slug, _)| slug).collect()
}

/// Rotate `goals` so the entry at `i` comes first.
///
/// A cyclic permutation: nothing is dropped or duplicated. Out-of-range
/// indices leave the list untouched.
pub fn rotate_at(goals: &mut [String], i: usize) {
    if i > 0 && i < goals.len() {
        goals.rotate_left(i);
    }
}

/// Move the slugs in `front` to the head of the list, preserving the
/// relative order within both groups.
pub fn prioritize(goals: &mut [String], front: &HashSet<String>) {
    goals.sort_by_key(|slug| !front.contains(slug));
}
