//! Shared fixtures for the migration tests: a temporary file layout with
//! seeded legacy artifacts, and scriptable renderers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use savedpages_core::{ConvertedCacheStore, LegacyCacheStore, Page, ReadingList, WriteMode};
use tempfile::TempDir;
use url::Url;

use super::orchestrator::ConversionOrchestrator;
use super::planner::MigrationPlanner;
use super::task::{MigrationBatch, MigrationTask};
use crate::render::{RenderCallback, RenderError, RenderJob, Renderer};

pub(crate) struct Fixture {
    dir: TempDir,
    pub legacy: LegacyCacheStore,
    pub converted: ConvertedCacheStore,
    pub planner: MigrationPlanner,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_mode(WriteMode::Overwrite)
    }

    pub fn with_mode(mode: WriteMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let legacy_dir = dir.path().join("okhttp-cache");
        std::fs::create_dir_all(&legacy_dir).unwrap();
        Self {
            legacy: LegacyCacheStore::new(legacy_dir),
            converted: ConvertedCacheStore::new(dir.path().join("converted-files"), mode),
            planner: MigrationPlanner::new("/api/rest_v1"),
            dir,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn page(title: &str) -> Page {
        Page::new(title, Url::parse("https://en.wikipedia.org").unwrap(), true)
    }

    pub fn reading_lists(titles: &[&str]) -> Vec<ReadingList> {
        vec![ReadingList::new("Saved", titles.iter().map(|t| Self::page(t)).collect())]
    }

    /// Write both generations of both legacy artifacts for `title`.
    pub fn seed_page(&self, title: &str) -> MigrationTask {
        let task = self.planner.task_for(&Self::page(title)).unwrap();

        let lead = serde_json::json!({
            "displaytitle": title,
            "sections": [{ "id": 0, "text": format!("<p>{title}</p>") }]
        });
        let remaining = serde_json::json!({ "sections": [] });

        for (key, body) in [(task.lead_key(), lead.to_string()), (task.remaining_key(), remaining.to_string())] {
            std::fs::write(self.legacy.path_for(key), body).unwrap();
            let prior = key.prior_generation().unwrap();
            std::fs::write(self.legacy.path_for(&prior), "metadata").unwrap();
        }
        task
    }

    pub fn seed_batch(&self, titles: &[&str]) -> MigrationBatch {
        MigrationBatch::new(titles.iter().map(|t| self.seed_page(t)).collect())
    }

    pub fn legacy_file_count(&self) -> usize {
        std::fs::read_dir(self.legacy.dir()).unwrap().count()
    }

    pub fn orchestrator(&self, renderer: StubRenderer) -> ConversionOrchestrator {
        ConversionOrchestrator::new(self.legacy.clone(), self.converted.clone(), Arc::new(renderer))
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Echo,
    FailingFor(String),
    NullOutput,
    Silent,
    Dropping,
    Reverse(usize),
    Shuffled(usize),
    Unavailable,
}

struct Inner {
    mode: Mode,
    submissions: AtomicUsize,
    pending: Mutex<Vec<(RenderJob, RenderCallback)>>,
    submitted: Mutex<Vec<String>>,
    order: Mutex<Vec<String>>,
}

/// Scriptable renderer. Clones share state, so a test can keep one handle
/// and inspect it after the orchestrator is done.
#[derive(Clone)]
pub(crate) struct StubRenderer {
    inner: Arc<Inner>,
}

impl StubRenderer {
    fn with(mode: Mode) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode,
                submissions: AtomicUsize::new(0),
                pending: Mutex::new(Vec::new()),
                submitted: Mutex::new(Vec::new()),
                order: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answers `"<html>{title}</html>"` as a JSON string literal from a fresh thread.
    pub fn echo() -> Self {
        Self::with(Mode::Echo)
    }

    pub fn failing_for(title: &str) -> Self {
        Self::with(Mode::FailingFor(title.to_string()))
    }

    pub fn null_output() -> Self {
        Self::with(Mode::NullOutput)
    }

    /// Holds every callback forever.
    pub fn silent() -> Self {
        Self::with(Mode::Silent)
    }

    /// Drops every callback without calling it.
    pub fn dropping() -> Self {
        Self::with(Mode::Dropping)
    }

    /// Waits for `n` submissions, then answers them last-first.
    pub fn reverse(n: usize) -> Self {
        Self::with(Mode::Reverse(n))
    }

    /// Waits for `n` submissions, then answers them in a scrambled order
    /// from four threads at once.
    pub fn shuffled(n: usize) -> Self {
        Self::with(Mode::Shuffled(n))
    }

    pub fn unavailable() -> Self {
        Self::with(Mode::Unavailable)
    }

    pub fn submissions(&self) -> usize {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    /// Titles in the order the renderer received them.
    pub fn submission_order(&self) -> Vec<String> {
        self.inner.submitted.lock().unwrap().clone()
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.inner.order.lock().unwrap().clone()
    }

    fn answer(inner: &Inner, job: RenderJob, on_result: RenderCallback) {
        inner.order.lock().unwrap().push(job.title.clone());
        let result = match &inner.mode {
            Mode::FailingFor(title) if *title == job.title => Err(RenderError::Script("boom".to_string())),
            Mode::NullOutput => Ok("null".to_string()),
            _ => Ok(serde_json::to_string(&format!("<html>{}</html>", job.title)).unwrap()),
        };
        on_result(result);
    }

    /// Queue a job, recording its submission under the same lock so the
    /// recorded order matches the queue order.
    fn enqueue(&self, job: RenderJob, on_result: RenderCallback) {
        let mut pending = self.inner.pending.lock().unwrap();
        self.inner.submitted.lock().unwrap().push(job.title.clone());
        pending.push((job, on_result));
    }

    fn release_when_full(&self, n: usize) -> Option<Vec<(RenderJob, RenderCallback)>> {
        let mut pending = self.inner.pending.lock().unwrap();
        (pending.len() == n).then(|| std::mem::take(&mut *pending))
    }
}

#[async_trait::async_trait]
impl Renderer for StubRenderer {
    async fn ready(&self) -> Result<(), RenderError> {
        match self.inner.mode {
            Mode::Unavailable => Err(RenderError::EngineUnavailable("converter assets missing".to_string())),
            _ => Ok(()),
        }
    }

    fn submit(&self, job: RenderJob, on_result: RenderCallback) {
        self.inner.submissions.fetch_add(1, Ordering::SeqCst);

        if !matches!(self.inner.mode, Mode::Silent | Mode::Reverse(_) | Mode::Shuffled(_)) {
            self.inner.submitted.lock().unwrap().push(job.title.clone());
        }

        match self.inner.mode.clone() {
            Mode::Echo | Mode::FailingFor(_) | Mode::NullOutput => {
                let inner = Arc::clone(&self.inner);
                std::thread::spawn(move || Self::answer(&inner, job, on_result));
            }
            Mode::Silent => self.enqueue(job, on_result),
            Mode::Dropping => drop(on_result),
            Mode::Unavailable => on_result(Err(RenderError::EngineUnavailable("not started".to_string()))),
            Mode::Reverse(n) => {
                self.enqueue(job, on_result);
                if let Some(batch) = self.release_when_full(n) {
                    let inner = Arc::clone(&self.inner);
                    std::thread::spawn(move || {
                        for (job, on_result) in batch.into_iter().rev() {
                            Self::answer(&inner, job, on_result);
                        }
                    });
                }
            }
            Mode::Shuffled(n) => {
                self.enqueue(job, on_result);
                if let Some(batch) = self.release_when_full(n) {
                    let mut slots: Vec<Option<(RenderJob, RenderCallback)>> = batch.into_iter().map(Some).collect();
                    let mut scrambled = Vec::with_capacity(n);
                    for i in 0..n {
                        if let Some(item) = slots[(i * 7 + 3) % n].take() {
                            scrambled.push(item);
                        }
                    }
                    scrambled.extend(slots.into_iter().flatten());

                    let chunk = n.div_ceil(4).max(1);
                    let mut groups = Vec::new();
                    while !scrambled.is_empty() {
                        let rest = scrambled.split_off(chunk.min(scrambled.len()));
                        groups.push(std::mem::replace(&mut scrambled, rest));
                    }
                    for group in groups {
                        let inner = Arc::clone(&self.inner);
                        std::thread::spawn(move || {
                            for (job, on_result) in group {
                                Self::answer(&inner, job, on_result);
                            }
                        });
                    }
                }
            }
        }
    }
}
