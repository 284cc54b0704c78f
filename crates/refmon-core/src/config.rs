use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration.
///
/// Output and reference directories live under the goal directory, matching
/// the layout the computation service and reference store expect.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directory holding the `.bb` goal files
    pub goal_dir: PathBuf,
    /// Directory for freshly generated outputs
    pub output_dir: PathBuf,
    /// Directory holding the last-accepted reference artifacts
    pub reference_dir: PathBuf,
    /// Extra source directories watched for changes
    pub watch_dirs: Vec<PathBuf>,
    /// Interval between periodic sweeps when nothing external triggers one
    pub sweep_delay: Option<Duration>,
    /// Start with graph comparison enabled
    pub graph: bool,
    /// Run the first sweep in reference-generation mode
    pub force_references: bool,
    /// Computation service endpoint
    pub service_url: String,
    /// Sound played when a regression is detected
    pub regression_sound: Option<PathBuf>,
    /// Sound played when a sweep finishes with no problems
    pub all_clear_sound: Option<PathBuf>,
}

impl MonitorConfig {
    /// Build a configuration rooted at `goal_dir` with default settings.
    pub fn new(goal_dir: impl Into<PathBuf>) -> Self {
        let goal_dir: PathBuf = goal_dir.into();
        let goal_dir = std::fs::canonicalize(&goal_dir).unwrap_or(goal_dir);
        Self {
            output_dir: goal_dir.join("out"),
            reference_dir: goal_dir.join("ref"),
            goal_dir,
            watch_dirs: Vec::new(),
            sweep_delay: None,
            graph: false,
            force_references: false,
            service_url: "http://localhost:8777/".to_string(),
            regression_sound: None,
            all_clear_sound: None,
        }
    }

    /// Ensure the output and reference directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.reference_dir)?;
        Ok(())
    }

    /// Path of the goal file for `slug`.
    pub fn goal_path(&self, slug: &str) -> PathBuf {
        self.goal_dir.join(format!("{slug}.{}", crate::scan::GOAL_EXT))
    }

    /// True when `path` is inside one of the monitor's own output
    /// directories.
    pub fn is_own_output(&self, path: &Path) -> bool {
        path.starts_with(&self.output_dir) || path.starts_with(&self.reference_dir)
    }
}
