//! Deduplicated registry of goals whose output drifted from the reference.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::jobs::types::{Category, JobKind, JobRequest, JobResponse};

/// One goal currently known to differ from its reference. Kept until a
/// clean response for the same key retires it.
#[derive(Debug, Clone)]
pub struct Problem {
    pub category: Category,
    pub request: JobRequest,
    pub error: String,
    pub document_diff: Option<String>,
    pub graph_diff: Option<u64>,
    /// Composite diff image left by the graph comparison, viewable on demand
    pub diff_image: Option<PathBuf>,
}

/// At most one entry per `(category, slug)`. The selected index models the
/// operator's cursor and survives removals of other entries.
#[derive(Debug, Default)]
pub struct ProblemRegistry {
    entries: Vec<Problem>,
    selected: usize,
}

impl ProblemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.entries.iter()
    }

    pub fn find(&self, category: Category, slug: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|p| p.category == category && p.request.slug == slug)
    }

    /// Slugs with at least one problem, in no particular order.
    pub fn slugs(&self) -> HashSet<String> {
        self.entries.iter().map(|p| p.request.slug.clone()).collect()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.entries.len().saturating_sub(1));
    }

    pub fn selected_problem(&self) -> Option<&Problem> {
        self.entries.get(self.selected)
    }

    /// Fold a response into the registry.
    ///
    /// A failure signal adds or overwrites the entry for its key; a clean
    /// response removes it. A clean reference regeneration also retires the
    /// compare entry for the slug, since the comparison baseline changed.
    ///
    /// Returns true when the response produced (or refreshed) a problem.
    pub fn apply(&mut self, response: &JobResponse) -> bool {
        let Some(category) = response.request.kind.category() else {
            return false;
        };

        if response.is_problem() {
            self.insert(Problem {
                category,
                request: response.request.clone(),
                error: response.error.clone(),
                document_diff: response.document_diff.clone(),
                graph_diff: response.graph_diff,
                diff_image: response.diff_image.clone(),
            });
            true
        } else {
            self.remove(category, &response.request.slug);
            if response.request.kind == JobKind::GenerateReference {
                self.remove(Category::Compare, &response.request.slug);
            }
            false
        }
    }

    fn insert(&mut self, problem: Problem) {
        match self.find(problem.category, &problem.request.slug) {
            Some(i) => self.entries[i] = problem,
            None => self.entries.push(problem),
        }
    }

    fn remove(&mut self, category: Category, slug: &str) {
        let Some(i) = self.find(category, slug) else {
            return;
        };
        self.entries.remove(i);
        // Keep the cursor on the same entry when an earlier one disappears
        if self.selected >= i && self.selected > 0 {
            self.selected -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn response(kind: JobKind, slug: &str, error: &str) -> JobResponse {
        let request = match kind {
            JobKind::GenerateReference => JobRequest::generate_reference(
                slug.to_string(),
                Path::new("in"),
                Path::new("ref"),
            ),
            _ => JobRequest::generate_and_compare(
                slug.to_string(),
                Path::new("in"),
                Path::new("out"),
                Path::new("ref"),
                false,
            ),
        };
        let mut resp = JobResponse::new(request);
        resp.error = error.to_string();
        resp
    }

    #[test]
    fn latest_response_wins_per_key() {
        let mut registry = ProblemRegistry::new();
        assert!(registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "first")));
        assert!(registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "second")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().next().unwrap().error, "second");
    }

    #[test]
    fn categories_are_distinct_keys() {
        let mut registry = ProblemRegistry::new();
        registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "drift"));
        registry.apply(&response(JobKind::GenerateReference, "alpha", "unreachable"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clean_response_retires_entry() {
        let mut registry = ProblemRegistry::new();
        registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "drift"));
        assert!(!registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "")));
        assert!(registry.is_empty());
    }

    #[test]
    fn clean_reference_retires_compare_problem() {
        let mut registry = ProblemRegistry::new();
        registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "drift"));
        registry.apply(&response(JobKind::GenerateReference, "alpha", "unreachable"));

        // The baseline was rebuilt; both buckets for the slug go away
        registry.apply(&response(JobKind::GenerateReference, "alpha", ""));
        assert!(registry.is_empty());
    }

    #[test]
    fn problem_keeps_the_diff_image_path() {
        let mut registry = ProblemRegistry::new();
        let mut resp = response(JobKind::GenerateAndCompare, "alpha", "graphs differ by 4 pixels");
        resp.graph_diff = Some(4);
        resp.diff_image = Some(PathBuf::from("/goals/out/alpha-diff.png"));
        registry.apply(&resp);

        assert_eq!(
            registry.selected_problem().unwrap().diff_image.as_deref(),
            Some(Path::new("/goals/out/alpha-diff.png"))
        );
    }

    #[test]
    fn removal_shifts_selection_backward() {
        let mut registry = ProblemRegistry::new();
        registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "a"));
        registry.apply(&response(JobKind::GenerateAndCompare, "beta", "b"));
        registry.apply(&response(JobKind::GenerateAndCompare, "gamma", "c"));
        registry.select(2);

        registry.apply(&response(JobKind::GenerateAndCompare, "beta", ""));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.selected(), 1);
        assert_eq!(registry.selected_problem().unwrap().request.slug, "gamma");
    }

    #[test]
    fn removal_after_selection_leaves_cursor() {
        let mut registry = ProblemRegistry::new();
        registry.apply(&response(JobKind::GenerateAndCompare, "alpha", "a"));
        registry.apply(&response(JobKind::GenerateAndCompare, "beta", "b"));
        registry.select(0);

        registry.apply(&response(JobKind::GenerateAndCompare, "beta", ""));
        assert_eq!(registry.selected(), 0);
        assert_eq!(registry.selected_problem().unwrap().request.slug, "alpha");
    }
}
