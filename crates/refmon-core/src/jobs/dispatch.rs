//! Dispatcher state machine.
//!
//! Owns the goal list, the problem registry and the sweep progress. Each
//! tick drains operator commands, classified file changes and completed
//! responses, then evaluates the guarded transitions for the current state
//! in a fixed priority order — the first guard that holds wins. All slow
//! work happens on the worker task; the dispatcher only moves messages and
//! state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::MonitorConfig;
use crate::cues::{self, Cue};
use crate::problems::ProblemRegistry;
use crate::scan;

use super::types::{JobKind, JobRequest, JobResponse};
use super::watcher::Change;

/// Global processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Init,
    Idle,
    Processing,
    GeneratingReference,
    GeneratingAndComparing,
    Waiting,
    Paused,
    Exiting,
}

/// Operator commands, applied as trigger mutations on the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Re-run the compare job for the selected problem
    Recheck,
    /// Regenerate the reference artifacts for the selected problem
    RegenerateReference,
    /// Open the selected problem's composite diff image
    ViewDiff,
    /// Toggle "generate references for all"; enabling it starts a sweep
    ToggleReferenceMode,
    /// Toggle graph comparison
    ToggleGraphs,
    PauseResume,
    /// Abort the sweep in flight, or start one when none is running
    StopStart,
    /// Move the cursor in the problem registry
    Select(usize),
    Quit,
}

/// Request-id range of the active sweep. Responses with ids at or below
/// `first_id` predate the sweep and never raise an alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct Batch {
    pub first_id: u64,
    pub last_id: u64,
}

/// Pending triggers, filled from the change and command channels and
/// consumed by the transition guards.
#[derive(Debug, Default)]
struct Triggers {
    source_change_at: Option<usize>,
    edited_slug: Option<String>,
    force_start: bool,
    force_stop: bool,
    quit: bool,
}

/// Job duration statistics for the current sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub last: Duration,
    pub total: Duration,
    pub count: u32,
}

impl SweepStats {
    fn record(&mut self, duration: Duration) {
        self.last = duration;
        self.total += duration;
        self.count += 1;
    }

    pub fn average(&self) -> Option<Duration> {
        (self.count > 0).then(|| self.total / self.count)
    }
}

pub struct Dispatcher {
    config: MonitorConfig,
    state: MonitorState,
    goals: Vec<String>,
    current: usize,
    problems: ProblemRegistry,
    batch: Batch,
    triggers: Triggers,
    stats: SweepStats,
    paused: bool,
    reference_mode: bool,
    graph_enabled: Arc<AtomicBool>,
    /// Request id of the sweep job being waited on
    awaiting: Option<u64>,
    last_sweep_end: Instant,

    changes_rx: mpsc::UnboundedReceiver<Change>,
    commands_rx: mpsc::UnboundedReceiver<OperatorCommand>,
    pending_tx: mpsc::UnboundedSender<JobRequest>,
    completed_rx: mpsc::UnboundedReceiver<JobResponse>,
    cues_tx: mpsc::UnboundedSender<Cue>,
}

impl Dispatcher {
    pub fn new(
        config: MonitorConfig,
        changes_rx: mpsc::UnboundedReceiver<Change>,
        commands_rx: mpsc::UnboundedReceiver<OperatorCommand>,
        pending_tx: mpsc::UnboundedSender<JobRequest>,
        completed_rx: mpsc::UnboundedReceiver<JobResponse>,
        cues_tx: mpsc::UnboundedSender<Cue>,
        graph_enabled: Arc<AtomicBool>,
    ) -> Self {
        let reference_mode = config.force_references;
        Self {
            config,
            state: MonitorState::Init,
            goals: Vec::new(),
            current: 0,
            problems: ProblemRegistry::new(),
            batch: Batch::default(),
            triggers: Triggers {
                // The first sweep starts immediately
                force_start: true,
                ..Triggers::default()
            },
            stats: SweepStats::default(),
            paused: false,
            reference_mode,
            graph_enabled,
            awaiting: None,
            last_sweep_end: Instant::now(),
            changes_rx,
            commands_rx,
            pending_tx,
            completed_rx,
            cues_tx,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn problems(&self) -> &ProblemRegistry {
        &self.problems
    }

    pub fn stats(&self) -> SweepStats {
        self.stats
    }

    /// Sweep progress in percent.
    pub fn progress(&self) -> f64 {
        if self.goals.is_empty() {
            0.0
        } else {
            100.0 * self.current as f64 / self.goals.len() as f64
        }
    }

    pub fn is_exiting(&self) -> bool {
        self.state == MonitorState::Exiting
    }

    /// Ask for an orderly shutdown, as if the operator had sent `Quit`.
    pub fn request_quit(&mut self) {
        self.triggers.quit = true;
    }

    /// One scheduler tick: absorb inputs, then run the machine until it
    /// settles. A single external event can enable a chain of transitions
    /// (Init → Idle → Processing → Generating → Waiting).
    pub fn tick(&mut self) {
        self.drain_commands();
        self.drain_changes();
        self.drain_responses();
        while self.step() {}
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            tracing::debug!(?command, "operator command");
            match command {
                OperatorCommand::Recheck => {
                    if let Some(problem) = self.problems.selected_problem() {
                        // Always a fresh request value; the one stored on
                        // the problem entry is never re-enqueued.
                        let request = self.compare_request(problem.request.slug.clone());
                        self.dispatch(request);
                    }
                }
                OperatorCommand::RegenerateReference => {
                    if let Some(problem) = self.problems.selected_problem() {
                        let request = self.reference_request(problem.request.slug.clone());
                        self.dispatch(request);
                    }
                }
                OperatorCommand::ViewDiff => {
                    match self
                        .problems
                        .selected_problem()
                        .and_then(|p| p.diff_image.as_deref())
                    {
                        Some(path) => cues::open_image(path),
                        None => tracing::info!("selected problem has no diff image"),
                    }
                }
                OperatorCommand::ToggleReferenceMode => {
                    self.reference_mode = !self.reference_mode;
                    tracing::info!(on = self.reference_mode, "reference mode");
                    if self.reference_mode {
                        self.triggers.force_start = true;
                    }
                }
                OperatorCommand::ToggleGraphs => {
                    let on = !self.graph_enabled.load(Ordering::Relaxed);
                    self.graph_enabled.store(on, Ordering::Relaxed);
                    tracing::info!(on, "graph comparison");
                }
                OperatorCommand::PauseResume => {
                    self.paused = !self.paused;
                    tracing::info!(paused = self.paused, "pause toggled");
                }
                OperatorCommand::StopStart => {
                    if matches!(self.state, MonitorState::Idle | MonitorState::Init) {
                        self.triggers.force_start = true;
                    } else {
                        self.triggers.force_stop = true;
                    }
                }
                OperatorCommand::Select(index) => self.problems.select(index),
                OperatorCommand::Quit => self.triggers.quit = true,
            }
        }
    }

    fn drain_changes(&mut self) {
        while let Ok(change) = self.changes_rx.try_recv() {
            tracing::debug!(?change, "file change");
            match change {
                Change::GoalEdited(slug) => self.triggers.edited_slug = Some(slug),
                // Stamp with the sweep position at the moment the change
                // was observed; rotation starts there.
                Change::SourceChanged => self.triggers.source_change_at = Some(self.current),
            }
        }
    }

    fn drain_responses(&mut self) {
        while let Ok(response) = self.completed_rx.try_recv() {
            self.stats.record(response.duration);
            let is_problem = self.problems.apply(&response);
            tracing::info!(
                id = response.request.id,
                kind = %response.request.kind,
                slug = %response.request.slug,
                problem = is_problem,
                secs = response.duration.as_secs_f64(),
                "job finished"
            );

            // Alert only for regressions introduced by the active sweep;
            // carried-over and post-stop responses stay quiet.
            if is_problem
                && self.state != MonitorState::Idle
                && response.request.id > self.batch.first_id
            {
                let _ = self.cues_tx.send(Cue::Regression);
            }

            if self.awaiting == Some(response.request.id) {
                self.awaiting = None;
                if self.state == MonitorState::Waiting {
                    self.current += 1;
                    self.state = MonitorState::Processing;
                }
            }
        }
    }

    /// Evaluate the transition table for the current state. Returns true
    /// when a transition fired.
    fn step(&mut self) -> bool {
        // Quit preempts every state except an in-flight job, which the
        // sentinel waits out on the worker's queue.
        if self.triggers.quit {
            if self.state != MonitorState::Exiting {
                tracing::info!("shutting down");
                let _ = self.pending_tx.send(JobRequest::quit());
                self.state = MonitorState::Exiting;
                return true;
            }
            return false;
        }

        match self.state {
            MonitorState::Init => {
                self.enter_idle();
                true
            }
            MonitorState::Idle => self.step_idle(),
            MonitorState::Processing => self.step_processing(),
            MonitorState::GeneratingReference => {
                self.dispatch_current(JobKind::GenerateReference);
                true
            }
            MonitorState::GeneratingAndComparing => {
                self.dispatch_current(JobKind::GenerateAndCompare);
                true
            }
            // Left via drain_responses when the awaited response lands
            MonitorState::Waiting => false,
            MonitorState::Paused => {
                if !self.paused || self.triggers.force_stop {
                    self.state = MonitorState::Processing;
                    true
                } else {
                    false
                }
            }
            MonitorState::Exiting => false,
        }
    }

    /// Init: clear triggers and progress. `force_start` deliberately
    /// survives so an abandoned sweep can restart fresh from Idle.
    fn enter_idle(&mut self) {
        self.triggers.edited_slug = None;
        self.triggers.source_change_at = None;
        self.triggers.force_stop = false;
        self.current = 0;
        self.awaiting = None;
        self.state = MonitorState::Idle;
    }

    /// Idle guards, in priority order: source change, goal edit, explicit
    /// start, periodic timer.
    fn step_idle(&mut self) -> bool {
        if self.triggers.source_change_at.take().is_some() {
            self.start_sweep();
            return true;
        }

        if let Some(slug) = self.triggers.edited_slug.take() {
            if let Some(index) = self.goals.iter().position(|g| g == &slug) {
                // Single-goal recheck: no rescan, progress jumps to the
                // edited goal's place in the existing list.
                tracing::info!(slug = %slug, index, "goal edited, rechecking");
                self.begin_batch();
                self.current = index;
                self.state = MonitorState::Processing;
                return true;
            }
            if self.config.goal_path(&slug).is_file() {
                // A goal we have not seen yet; pick it up with a full sweep
                self.start_sweep();
                return true;
            }
            return false;
        }

        if self.triggers.force_start {
            self.triggers.force_start = false;
            self.start_sweep();
            return true;
        }

        if let Some(delay) = self.config.sweep_delay {
            if self.last_sweep_end.elapsed() >= delay {
                self.start_sweep();
                return true;
            }
        }

        false
    }

    /// Processing guards, in priority order: stop, goal edit, source
    /// change, sweep complete, restart, pause, reference mode, compare.
    fn step_processing(&mut self) -> bool {
        if self.triggers.force_stop {
            tracing::info!("sweep aborted");
            // A stop also cancels pause and reference mode, so the next
            // start runs a plain sweep immediately
            self.paused = false;
            self.reference_mode = false;
            self.state = MonitorState::Init;
            return true;
        }

        if let Some(slug) = self.triggers.edited_slug.take() {
            match self.goals.iter().position(|g| g == &slug) {
                Some(index) => {
                    // Visit the edited goal next, then everything else again
                    tracing::info!(slug = %slug, "goal edited, reordering sweep");
                    scan::rotate_at(&mut self.goals, index);
                    self.current = 0;
                    return true;
                }
                // A goal new to this sweep; treat like a source change
                None => self.triggers.source_change_at = Some(self.current),
            }
        }

        if let Some(index) = self.triggers.source_change_at.take() {
            if index < self.goals.len() {
                tracing::info!(index, "source changed, reordering sweep");
                scan::rotate_at(&mut self.goals, index);
                scan::prioritize(&mut self.goals, &self.problems.slugs());
                self.current = 0;
                return true;
            }
        }

        if self.current >= self.goals.len() {
            tracing::info!(
                problems = self.problems.len(),
                avg_secs = self.stats.average().unwrap_or_default().as_secs_f64(),
                "sweep complete"
            );
            if self.problems.is_empty() {
                let _ = self.cues_tx.send(Cue::AllClear);
            }
            // Reference sweeps are one-shot
            self.reference_mode = false;
            self.last_sweep_end = Instant::now();
            self.state = MonitorState::Init;
            return true;
        }

        if self.triggers.force_start {
            // Abandon this sweep; force_start survives Init and restarts
            self.state = MonitorState::Init;
            return true;
        }

        if self.paused {
            self.state = MonitorState::Paused;
            return true;
        }

        self.state = if self.reference_mode {
            MonitorState::GeneratingReference
        } else {
            MonitorState::GeneratingAndComparing
        };
        true
    }

    fn begin_batch(&mut self) {
        self.batch.first_id = self.batch.last_id;
        self.stats = SweepStats::default();
    }

    fn start_sweep(&mut self) {
        self.goals = scan::scan_goals(&self.config.goal_dir);
        scan::prioritize(&mut self.goals, &self.problems.slugs());
        self.begin_batch();
        self.current = 0;
        self.state = MonitorState::Processing;
        tracing::info!(goals = self.goals.len(), "sweep started");
    }

    fn compare_request(&self, slug: String) -> JobRequest {
        JobRequest::generate_and_compare(
            slug,
            &self.config.goal_dir,
            &self.config.output_dir,
            &self.config.reference_dir,
            self.graph_enabled.load(Ordering::Relaxed),
        )
    }

    fn reference_request(&self, slug: String) -> JobRequest {
        JobRequest::generate_reference(slug, &self.config.goal_dir, &self.config.reference_dir)
    }

    /// Dispatch the sweep job for the current goal and wait for it.
    fn dispatch_current(&mut self, kind: JobKind) {
        let slug = self.goals[self.current].clone();
        let request = match kind {
            JobKind::GenerateReference => self.reference_request(slug),
            _ => self.compare_request(slug),
        };
        self.awaiting = Some(request.id);
        self.dispatch(request);
        self.state = MonitorState::Waiting;
    }

    fn dispatch(&mut self, request: JobRequest) {
        self.batch.last_id = request.id;
        tracing::debug!(
            id = request.id,
            kind = %request.kind,
            slug = %request.slug,
            "dispatching job"
        );
        if self.pending_tx.send(request).is_err() {
            tracing::warn!("worker channel closed, dropping job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::SystemTime;

    struct Harness {
        dispatcher: Dispatcher,
        changes_tx: mpsc::UnboundedSender<Change>,
        commands_tx: mpsc::UnboundedSender<OperatorCommand>,
        pending_rx: mpsc::UnboundedReceiver<JobRequest>,
        completed_tx: mpsc::UnboundedSender<JobResponse>,
        cues_rx: mpsc::UnboundedReceiver<Cue>,
        _tmp: tempfile::TempDir,
    }

    fn harness(slugs: &[&str]) -> Harness {
        harness_with(slugs, |_| {})
    }

    fn harness_with(slugs: &[&str], tweak: impl FnOnce(&mut MonitorConfig)) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        for (i, slug) in slugs.iter().enumerate() {
            // Decreasing mtimes so the scan order matches the given order
            let file = File::create(tmp.path().join(format!("{slug}.bb"))).unwrap();
            file.set_modified(SystemTime::now() - Duration::from_secs(60 * (i as u64 + 1)))
                .unwrap();
        }

        let mut config = MonitorConfig::new(tmp.path());
        tweak(&mut config);

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        let (cues_tx, cues_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(
            config,
            changes_rx,
            commands_rx,
            pending_tx,
            completed_rx,
            cues_tx,
            Arc::new(AtomicBool::new(false)),
        );

        Harness {
            dispatcher,
            changes_tx,
            commands_tx,
            pending_rx,
            completed_tx,
            cues_rx,
            _tmp: tmp,
        }
    }

    impl Harness {
        fn next_request(&mut self) -> JobRequest {
            self.pending_rx.try_recv().expect("expected a dispatched job")
        }

        fn assert_no_request(&mut self) {
            assert!(self.pending_rx.try_recv().is_err(), "unexpected job dispatched");
        }

        fn respond_clean(&mut self, request: JobRequest) {
            self.completed_tx.send(JobResponse::new(request)).unwrap();
        }

        fn respond_problem(&mut self, request: JobRequest, error: &str) {
            let mut response = JobResponse::new(request);
            response.error = error.to_string();
            self.completed_tx.send(response).unwrap();
        }

        fn drain_cues(&mut self) -> Vec<Cue> {
            let mut cues = Vec::new();
            while let Ok(cue) = self.cues_rx.try_recv() {
                cues.push(cue);
            }
            cues
        }

        /// Drive a full sweep answering every job cleanly.
        fn run_clean_sweep(&mut self, goal_count: usize) {
            for _ in 0..goal_count {
                self.dispatcher.tick();
                let request = self.next_request();
                self.respond_clean(request);
            }
            self.dispatcher.tick();
        }
    }

    #[test]
    fn first_sweep_visits_every_goal_then_all_clear() {
        let mut h = harness(&["a", "b"]);

        h.dispatcher.tick();
        let first = h.next_request();
        assert_eq!(first.slug, "a");
        assert_eq!(first.kind, JobKind::GenerateAndCompare);
        assert_eq!(h.dispatcher.state(), MonitorState::Waiting);

        h.respond_clean(first);
        h.dispatcher.tick();
        let second = h.next_request();
        assert_eq!(second.slug, "b");

        h.respond_clean(second);
        h.dispatcher.tick();
        assert_eq!(h.dispatcher.state(), MonitorState::Idle);
        assert_eq!(h.drain_cues(), [Cue::AllClear]);

        // Idle with no triggers stays put
        h.dispatcher.tick();
        h.assert_no_request();
        assert!(h.drain_cues().is_empty());
    }

    #[test]
    fn edited_goal_while_idle_rechecks_in_place() {
        let mut h = harness(&["alpha", "beta"]);
        h.run_clean_sweep(2);
        h.drain_cues();

        h.changes_tx
            .send(Change::GoalEdited("beta".into()))
            .unwrap();
        h.dispatcher.tick();

        let request = h.next_request();
        assert_eq!(request.slug, "beta");
        assert_eq!(request.kind, JobKind::GenerateAndCompare);
        h.assert_no_request();
        assert_eq!(h.dispatcher.current(), 1);
        assert_eq!(h.dispatcher.state(), MonitorState::Waiting);

        // The single-goal sweep runs to completion from beta's index
        h.respond_clean(request);
        h.dispatcher.tick();
        assert_eq!(h.dispatcher.state(), MonitorState::Idle);
    }

    #[test]
    fn source_change_mid_sweep_rotates_and_prioritizes() {
        let names: Vec<String> = (0..10).map(|i| format!("g{i}")).collect();
        let slugs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut h = harness(&slugs);

        // Process g0..g4; g2 comes back as a problem
        for i in 0..5 {
            h.dispatcher.tick();
            let request = h.next_request();
            assert_eq!(request.slug, format!("g{i}"));
            if i == 2 {
                h.respond_problem(request, "drift");
            } else {
                h.respond_clean(request);
            }
        }
        assert_eq!(h.drain_cues(), [Cue::Regression]);

        // Now waiting on g5
        h.dispatcher.tick();
        let inflight = h.next_request();
        assert_eq!(inflight.slug, "g5");
        assert_eq!(h.dispatcher.current(), 5);

        h.changes_tx.send(Change::SourceChanged).unwrap();
        h.dispatcher.tick();
        // Still waiting; the stamp was taken at index 5
        assert_eq!(h.dispatcher.state(), MonitorState::Waiting);

        h.respond_clean(inflight);
        h.dispatcher.tick();

        // Rotated to start at g5, with the problem slug pulled to the front
        let goals = h.dispatcher.goals().to_vec();
        assert_eq!(goals.len(), 10);
        assert_eq!(goals[0], "g2");
        assert_eq!(goals[1], "g5");
        let mut sorted = goals.clone();
        sorted.sort();
        let mut expected: Vec<String> = names.clone();
        expected.sort();
        assert_eq!(sorted, expected);

        let request = h.next_request();
        assert_eq!(request.slug, "g2");
    }

    #[test]
    fn stale_responses_never_alert() {
        let mut h = harness(&["a"]);

        h.dispatcher.tick();
        let old = h.next_request();
        h.respond_clean(old.clone());
        h.dispatcher.tick();
        h.drain_cues();

        // Second sweep raises the batch floor above the old request id
        h.commands_tx.send(OperatorCommand::StopStart).unwrap();
        h.dispatcher.tick();
        let fresh = h.next_request();
        assert!(fresh.id > old.id);

        h.respond_problem(old, "late failure");
        h.dispatcher.tick();
        assert!(h.drain_cues().is_empty(), "stale response must not alert");
        assert_eq!(h.dispatcher.problems().len(), 1);

        h.respond_problem(fresh, "fresh failure");
        h.dispatcher.tick();
        assert_eq!(h.drain_cues(), [Cue::Regression]);
    }

    #[test]
    fn responses_while_idle_update_registry_silently() {
        let mut h = harness(&["a"]);
        h.run_clean_sweep(1);
        h.drain_cues();

        let request = JobRequest::generate_and_compare(
            "a".into(),
            std::path::Path::new("in"),
            std::path::Path::new("out"),
            std::path::Path::new("ref"),
            false,
        );
        h.respond_problem(request, "late");
        h.dispatcher.tick();

        assert_eq!(h.dispatcher.problems().len(), 1);
        assert!(h.drain_cues().is_empty());
    }

    #[test]
    fn stop_aborts_sweep_after_inflight_job() {
        let mut h = harness(&["a", "b"]);

        h.dispatcher.tick();
        let inflight = h.next_request();

        h.commands_tx.send(OperatorCommand::StopStart).unwrap();
        h.dispatcher.tick();
        // No mid-job cancellation; the stop applies once the response lands
        assert_eq!(h.dispatcher.state(), MonitorState::Waiting);

        h.respond_clean(inflight);
        h.dispatcher.tick();
        assert_eq!(h.dispatcher.state(), MonitorState::Idle);
        h.assert_no_request();
    }

    #[test]
    fn stop_resets_pause_for_the_next_sweep() {
        let mut h = harness(&["a", "b"]);

        h.dispatcher.tick();
        let inflight = h.next_request();
        h.commands_tx.send(OperatorCommand::PauseResume).unwrap();
        h.commands_tx.send(OperatorCommand::StopStart).unwrap();
        h.respond_clean(inflight);
        h.dispatcher.tick();
        assert_eq!(h.dispatcher.state(), MonitorState::Idle);

        // The restarted sweep must dispatch right away, not sit in Paused
        h.commands_tx.send(OperatorCommand::StopStart).unwrap();
        h.dispatcher.tick();
        assert_ne!(h.dispatcher.state(), MonitorState::Paused);
        assert_eq!(h.next_request().slug, "a");
    }

    #[test]
    fn stop_cancels_reference_mode() {
        let mut h = harness(&["a"]);

        h.dispatcher.tick();
        let inflight = h.next_request();
        h.commands_tx
            .send(OperatorCommand::ToggleReferenceMode)
            .unwrap();
        h.commands_tx.send(OperatorCommand::StopStart).unwrap();
        h.respond_clean(inflight);
        h.dispatcher.tick();

        // force_start from the toggle survives the abort; the restarted
        // sweep runs ordinary compares
        assert_eq!(h.next_request().kind, JobKind::GenerateAndCompare);
    }

    #[test]
    fn pause_holds_the_sweep_between_jobs() {
        let mut h = harness(&["a", "b"]);

        h.dispatcher.tick();
        let first = h.next_request();
        h.commands_tx.send(OperatorCommand::PauseResume).unwrap();
        h.respond_clean(first);
        h.dispatcher.tick();

        assert_eq!(h.dispatcher.state(), MonitorState::Paused);
        h.assert_no_request();

        h.commands_tx.send(OperatorCommand::PauseResume).unwrap();
        h.dispatcher.tick();
        assert_eq!(h.next_request().slug, "b");
    }

    #[test]
    fn reference_sweep_retires_compare_problems() {
        let mut h = harness(&["a", "b"]);

        // First sweep: both goals drift
        for _ in 0..2 {
            h.dispatcher.tick();
            let request = h.next_request();
            h.respond_problem(request, "drift");
        }
        h.dispatcher.tick();
        assert_eq!(h.dispatcher.problems().len(), 2);
        h.drain_cues();

        // Reference mode regenerates every baseline
        h.commands_tx
            .send(OperatorCommand::ToggleReferenceMode)
            .unwrap();
        for _ in 0..2 {
            h.dispatcher.tick();
            let request = h.next_request();
            assert_eq!(request.kind, JobKind::GenerateReference);
            assert!(request.graph);
            h.respond_clean(request);
        }
        h.dispatcher.tick();

        // Clean references retired the compare problems without any
        // compare job running
        assert!(h.dispatcher.problems().is_empty());
        assert_eq!(h.drain_cues(), [Cue::AllClear]);
        assert_eq!(h.dispatcher.state(), MonitorState::Idle);
    }

    #[test]
    fn timer_starts_the_next_sweep() {
        let mut h = harness_with(&["a"], |config| {
            config.sweep_delay = Some(Duration::ZERO);
        });
        h.run_clean_sweep(1);

        h.dispatcher.tick();
        assert_eq!(h.next_request().slug, "a");
    }

    #[test]
    fn recheck_builds_a_fresh_request() {
        let mut h = harness(&["a"]);
        h.dispatcher.tick();
        let request = h.next_request();
        h.respond_problem(request, "drift");
        h.dispatcher.tick();
        h.drain_cues();

        let stored_id = h.dispatcher.problems().iter().next().unwrap().request.id;
        h.commands_tx.send(OperatorCommand::Recheck).unwrap();
        h.dispatcher.tick();

        let recheck = h.next_request();
        assert_eq!(recheck.slug, "a");
        assert_eq!(recheck.kind, JobKind::GenerateAndCompare);
        assert!(recheck.id > stored_id, "stored request must not be reused");

        h.respond_clean(recheck);
        h.dispatcher.tick();
        assert!(h.dispatcher.problems().is_empty());
    }

    #[test]
    fn quit_sends_the_sentinel_and_exits() {
        let mut h = harness(&["a"]);
        h.dispatcher.tick();
        let _inflight = h.next_request();

        h.commands_tx.send(OperatorCommand::Quit).unwrap();
        h.dispatcher.tick();

        assert!(h.dispatcher.is_exiting());
        let sentinel = h.next_request();
        assert_eq!(sentinel.kind, JobKind::Quit);
    }
}
