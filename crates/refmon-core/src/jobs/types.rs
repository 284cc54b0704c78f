//! Job request/response types exchanged with the worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Error marker for a comparison that found no reference to compare with.
pub const MISSING_REFERENCE: &str = "missing reference, showing fresh output";

/// Request ids are globally unique and monotonically increasing; they are
/// never reused, which is what lets the dispatcher tell sweep-fresh
/// responses from carried-over ones.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// What the worker should do for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// (Re)generate the reference artifacts for a goal
    GenerateReference,
    /// Regenerate outputs and compare them against the reference
    GenerateAndCompare,
    /// Sentinel that stops the worker once it reaches the front of the queue
    Quit,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::GenerateReference => write!(f, "reference"),
            JobKind::GenerateAndCompare => write!(f, "compare"),
            JobKind::Quit => write!(f, "quit"),
        }
    }
}

/// Problem bucket a job kind reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Reference,
    Compare,
}

impl JobKind {
    pub fn category(self) -> Option<Category> {
        match self {
            JobKind::GenerateReference => Some(Category::Reference),
            JobKind::GenerateAndCompare => Some(Category::Compare),
            JobKind::Quit => None,
        }
    }
}

/// Immutable description of one job. A fresh value is constructed for every
/// enqueue; a request stored on a problem entry is never re-submitted.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub id: u64,
    pub kind: JobKind,
    pub slug: String,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub graph: bool,
}

impl JobRequest {
    fn next_id() -> u64 {
        NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// A reference-generation job. Output goes straight into the reference
    /// directory; graphs are always rendered so the baseline is complete.
    pub fn generate_reference(slug: String, source_dir: &Path, reference_dir: &Path) -> Self {
        Self {
            id: Self::next_id(),
            kind: JobKind::GenerateReference,
            slug,
            source_dir: source_dir.to_path_buf(),
            output_dir: reference_dir.to_path_buf(),
            reference_dir: reference_dir.to_path_buf(),
            graph: true,
        }
    }

    /// A generate-and-compare job.
    pub fn generate_and_compare(
        slug: String,
        source_dir: &Path,
        output_dir: &Path,
        reference_dir: &Path,
        graph: bool,
    ) -> Self {
        Self {
            id: Self::next_id(),
            kind: JobKind::GenerateAndCompare,
            slug,
            source_dir: source_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            reference_dir: reference_dir.to_path_buf(),
            graph,
        }
    }

    /// The quit sentinel.
    pub fn quit() -> Self {
        Self {
            id: Self::next_id(),
            kind: JobKind::Quit,
            slug: String::new(),
            source_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            reference_dir: PathBuf::new(),
            graph: false,
        }
    }

}

/// Outcome of one job. The worker emits exactly one per request, always,
/// even on failure.
#[derive(Debug, Clone)]
pub struct JobResponse {
    pub request: JobRequest,
    pub duration: Duration,
    /// Empty string means no error
    pub error: String,
    /// Document diff text, or the fresh-output dump when no reference exists
    pub document_diff: Option<String>,
    /// Graph pixel difference, present only when positive
    pub graph_diff: Option<u64>,
    /// Stacked diff/reference/output composite image, when graphs differed
    pub diff_image: Option<PathBuf>,
}

impl JobResponse {
    pub fn new(request: JobRequest) -> Self {
        Self {
            request,
            duration: Duration::ZERO,
            error: String::new(),
            document_diff: None,
            graph_diff: None,
            diff_image: None,
        }
    }

    /// Whether any field carries a failure signal.
    pub fn is_problem(&self) -> bool {
        !self.error.is_empty()
            || self.document_diff.as_deref().is_some_and(|d| !d.is_empty())
            || self.graph_diff.is_some_and(|n| n > 0)
    }
}
