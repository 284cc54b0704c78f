//! Single-flight job executor.
//!
//! One spawned task pulls requests off the pending channel in FIFO order
//! and performs all the slow work: the service call, the reference check
//! and the diffs. Exactly one response is emitted per request; every
//! failure mode is folded into response fields, nothing crosses the
//! channel boundary as an error.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::diff;
use crate::reference::{check_reference, RefStatus};
use crate::service::{ComputeService, GenerateRequest};

use super::types::{JobKind, JobRequest, JobResponse, MISSING_REFERENCE};

/// Spawns the worker task.
///
/// Returns the pending-job sender, the completed-response receiver and the
/// task handle. The worker stops only when it observes a `Quit` request;
/// the channel being FIFO, that happens after every previously enqueued
/// job has finished — there is no mid-job cancellation.
#[allow(clippy::type_complexity)]
pub fn spawn_worker(
    service: Arc<dyn ComputeService>,
    graph_enabled: Arc<AtomicBool>,
) -> (
    mpsc::UnboundedSender<JobRequest>,
    mpsc::UnboundedReceiver<JobResponse>,
    tokio::task::JoinHandle<()>,
) {
    let (pending_tx, mut pending_rx) = mpsc::unbounded_channel::<JobRequest>();
    let (completed_tx, completed_rx) = mpsc::unbounded_channel::<JobResponse>();

    let handle = tokio::spawn(async move {
        tracing::debug!("worker started");
        while let Some(request) = pending_rx.recv().await {
            if request.kind == JobKind::Quit {
                break;
            }
            let response = execute(&*service, &graph_enabled, request).await;
            if completed_tx.send(response).is_err() {
                // Dispatcher gone; nothing left to report to
                break;
            }
        }
        tracing::debug!("worker stopped");
    });

    (pending_tx, completed_rx, handle)
}

async fn execute(
    service: &dyn ComputeService,
    graph_enabled: &AtomicBool,
    request: JobRequest,
) -> JobResponse {
    let started = Instant::now();
    let mut response = JobResponse::new(request);

    match response.request.kind {
        JobKind::GenerateReference => {
            tracing::info!(
                id = response.request.id,
                slug = %response.request.slug,
                "generating reference"
            );
            let generate = GenerateRequest {
                slug: response.request.slug.clone(),
                source_dir: response.request.source_dir.clone(),
                output_dir: response.request.output_dir.clone(),
                graph: true,
            };
            if let Err(e) = service.generate(&generate).await {
                response.error = e.to_string();
            }
        }
        JobKind::GenerateAndCompare => {
            tracing::info!(
                id = response.request.id,
                slug = %response.request.slug,
                "generating and comparing"
            );
            let generate = GenerateRequest {
                slug: response.request.slug.clone(),
                source_dir: response.request.source_dir.clone(),
                output_dir: response.request.output_dir.clone(),
                graph: response.request.graph,
            };
            match service.generate(&generate).await {
                Err(e) => response.error = e.to_string(),
                Ok(()) => compare(graph_enabled, &mut response).await,
            }
        }
        // Filtered out by the worker loop
        JobKind::Quit => {}
    }

    response.duration = started.elapsed();
    response
}

async fn compare(graph_enabled: &AtomicBool, response: &mut JobResponse) {
    let slug = response.request.slug.clone();
    let source_dir = response.request.source_dir.clone();
    let output_dir = response.request.output_dir.clone();
    let reference_dir = response.request.reference_dir.clone();

    match check_reference(&slug, &source_dir, &reference_dir) {
        RefStatus::Missing => {
            // Nothing to compare against; show the operator what was
            // produced instead of a diff.
            response.error = MISSING_REFERENCE.to_string();
            response.document_diff = Some(
                diff::document_dump(&slug, &output_dir)
                    .unwrap_or_else(|e| format!("could not read fresh output: {e:#}")),
            );
        }
        status @ (RefStatus::Stale | RefStatus::UpToDate) => {
            if status == RefStatus::Stale {
                tracing::debug!(slug = %slug, "reference artifacts are stale, comparing anyway");
            }

            match diff::document_diff(&slug, &output_dir, &reference_dir) {
                Ok(text) => response.document_diff = text,
                Err(e) => response.error = format!("document comparison failed: {e:#}"),
            }

            if graph_enabled.load(Ordering::Relaxed) {
                let graphs = diff::graph_diff(&slug, &output_dir, &reference_dir).await;
                response.diff_image = graphs.diff_image;
                if !response.error.is_empty() && (graphs.error.is_some() || graphs.pixels > 0) {
                    response.error.push('\n');
                }
                if let Some(error) = graphs.error {
                    let _ = write!(response.error, "error comparing graphs:\n{error}");
                } else if graphs.pixels > 0 {
                    response.graph_diff = Some(graphs.pixels);
                    let _ = write!(
                        response.error,
                        "graphs differ by {} pixels",
                        graphs.pixels
                    );
                }
            }
        }
    }
}
