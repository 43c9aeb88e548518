//! Drives the renderer over a batch and persists the results.
//!
//! Each task runs on its own tokio task, bounded by a semaphore. Renderer
//! callbacks arrive in any order on any thread; completion is counted on an
//! atomic [`CompletionTracker`] so exactly one completion observes that the
//! batch is done.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinSet;

use savedpages_core::{ConvertedCacheStore, Error, LegacyCacheStore};

use super::task::{MigrationBatch, MigrationTask};
use crate::render::{RenderError, RenderJob, Renderer, decode_output};

/// Counts finished tasks and reports the one that finishes the batch.
#[derive(Debug)]
pub struct CompletionTracker {
    total: usize,
    completed: AtomicUsize,
}

impl CompletionTracker {
    pub fn new(total: usize) -> Self {
        Self { total, completed: AtomicUsize::new(0) }
    }

    /// Record one finished task.
    ///
    /// Returns true for exactly one caller: the one whose completion brings
    /// the count to the batch size. Extra completions never return true.
    pub fn record(&self) -> bool {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        completed == self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}

/// Why a task produced no document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A legacy artifact is missing.
    NotFound,
    /// A legacy artifact exists but could not be read as text.
    Unreadable,
    /// The renderer failed, timed out, or returned nothing.
    RenderFailure,
    /// The converted document could not be written.
    IoFailure,
}

/// Result of converting one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Converted,
    /// A converted document already existed and was kept.
    Skipped,
    Failed { kind: FailureKind, message: String },
}

impl TaskStatus {
    fn failed(kind: FailureKind, err: impl std::fmt::Display) -> Self {
        TaskStatus::Failed { kind, message: err.to_string() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub title: String,
    #[serde(flatten)]
    pub status: TaskStatus,
}

/// Per-task results of one conversion pass, in batch order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub tasks: Vec<TaskReport>,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Whether the final completion of the batch was observed.
    pub batch_completed: bool,
}

impl ConversionReport {
    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Failed { .. }))
    }
}

/// Converts every task of a batch through a [`Renderer`].
#[derive(Clone)]
pub struct ConversionOrchestrator {
    legacy: LegacyCacheStore,
    converted: ConvertedCacheStore,
    renderer: Arc<dyn Renderer>,
    render_timeout: Duration,
    max_concurrency: usize,
    skip_converted: bool,
}

impl ConversionOrchestrator {
    pub fn new(legacy: LegacyCacheStore, converted: ConvertedCacheStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            legacy,
            converted,
            renderer,
            render_timeout: Duration::from_secs(60),
            max_concurrency: 4,
            skip_converted: false,
        }
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Keep documents that already exist instead of rendering them again.
    pub fn with_skip_converted(mut self, skip: bool) -> Self {
        self.skip_converted = skip;
        self
    }

    /// Convert every task in `batch`.
    ///
    /// Per-task failures are logged and reported, never returned. Returns
    /// once every task has finished.
    pub async fn convert(&self, batch: &MigrationBatch) -> ConversionReport {
        let tracker = Arc::new(CompletionTracker::new(batch.len()));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (index, task) in batch.iter().enumerate() {
            let this = self.clone();
            let task = Arc::clone(task);
            let tracker = Arc::clone(&tracker);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                // NOTE: Hold permit for task duration to enforce concurrency limit
                let _permit = semaphore.acquire_owned().await.ok();
                let status = this.convert_one(&task).await;
                let finished_batch = tracker.record();
                (index, status, finished_batch)
            });
        }

        let mut statuses: Vec<Option<TaskStatus>> = vec![None; batch.len()];
        let mut batch_completed = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, status, finished_batch)) => {
                    statuses[index] = Some(status);
                    batch_completed |= finished_batch;
                }
                Err(e) => tracing::error!(error = %e, "conversion task aborted"),
            }
        }

        let mut report = ConversionReport { batch_completed, ..Default::default() };
        for (task, status) in batch.iter().zip(statuses) {
            let status = status.unwrap_or_else(|| TaskStatus::failed(FailureKind::RenderFailure, "conversion task aborted"));
            match status {
                TaskStatus::Converted => report.converted += 1,
                TaskStatus::Skipped => report.skipped += 1,
                TaskStatus::Failed { .. } => report.failed += 1,
            }
            report.tasks.push(TaskReport { title: task.title().to_string(), status });
        }

        tracing::info!(
            total = batch.len(),
            converted = report.converted,
            skipped = report.skipped,
            failed = report.failed,
            completed = tracker.completed(),
            "conversion pass finished"
        );
        report
    }

    async fn convert_one(&self, task: &MigrationTask) -> TaskStatus {
        if self.skip_converted {
            match self.converted.exists(task.title()).await {
                Ok(true) => {
                    task.mark_rendered();
                    tracing::debug!(title = task.title(), "converted document already present");
                    return TaskStatus::Skipped;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(title = task.title(), error = %e, "could not check converted document"),
            }
        }

        let (lead_json, remaining_json) = match self.read_sources(task).await {
            Ok(sources) => sources,
            Err(e) => {
                let kind = if e.is_not_found() { FailureKind::NotFound } else { FailureKind::Unreadable };
                tracing::warn!(title = task.title(), error = %e, "legacy artifact unavailable");
                return TaskStatus::failed(kind, e);
            }
        };

        let document = match self.render(task, lead_json, remaining_json).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(title = task.title(), error = %e, "render failed");
                return TaskStatus::failed(FailureKind::RenderFailure, e);
            }
        };

        if let Err(e) = self.converted.write(task.title(), &document).await {
            tracing::warn!(title = task.title(), error = %e, "could not write converted document");
            return TaskStatus::failed(FailureKind::IoFailure, e);
        }

        task.mark_rendered();
        TaskStatus::Converted
    }

    async fn read_sources(&self, task: &MigrationTask) -> Result<(String, String), Error> {
        let (lead, remaining) =
            tokio::try_join!(self.legacy.read(task.lead_key()), self.legacy.read(task.remaining_key()))?;

        let lead = String::from_utf8(lead.to_vec())
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", task.lead_key())))?;
        let remaining = String::from_utf8(remaining.to_vec())
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", task.remaining_key())))?;
        Ok((lead, remaining))
    }

    async fn render(&self, task: &MigrationTask, lead_json: String, remaining_json: String) -> Result<String, RenderError> {
        let (tx, rx) = oneshot::channel();
        let job = RenderJob { title: task.title().to_string(), lead_json, remaining_json };

        self.renderer.submit(
            job,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        match tokio::time::timeout(self.render_timeout, rx).await {
            Ok(Ok(Ok(raw))) => decode_output(&raw),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(RenderError::EngineClosed),
            Err(_) => Err(RenderError::Timeout(self.render_timeout.as_millis() as u64)),
        }
    }
}
