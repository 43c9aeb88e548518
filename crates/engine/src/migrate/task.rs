//! Units of migration work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use savedpages_core::{CacheKey, cache_key};

/// One saved page to convert.
///
/// Shared between the orchestrator's per-page futures and the gate; the
/// only mutable part is the rendered flag.
#[derive(Debug)]
pub struct MigrationTask {
    title: String,
    lead_url: String,
    remaining_url: String,
    lead_key: CacheKey,
    remaining_key: CacheKey,
    rendered: AtomicBool,
}

impl MigrationTask {
    /// Build a task, deriving both cache keys from the URLs.
    pub fn new(title: impl Into<String>, lead_url: impl Into<String>, remaining_url: impl Into<String>) -> Self {
        let lead_url = lead_url.into();
        let remaining_url = remaining_url.into();
        Self {
            title: title.into(),
            lead_key: cache_key(&lead_url),
            remaining_key: cache_key(&remaining_url),
            lead_url,
            remaining_url,
            rendered: AtomicBool::new(false),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn lead_url(&self) -> &str {
        &self.lead_url
    }

    pub fn remaining_url(&self) -> &str {
        &self.remaining_url
    }

    pub fn lead_key(&self) -> &CacheKey {
        &self.lead_key
    }

    pub fn remaining_key(&self) -> &CacheKey {
        &self.remaining_key
    }

    /// Whether the converted document has been durably written.
    pub fn rendered_available(&self) -> bool {
        self.rendered.load(Ordering::Acquire)
    }

    /// Record that the converted document is on disk.
    ///
    /// Returns false if the flag was already set.
    pub(crate) fn mark_rendered(&self) -> bool {
        !self.rendered.swap(true, Ordering::AcqRel)
    }
}

/// All tasks of one planning pass, processed and gated as a unit.
#[derive(Debug, Clone, Default)]
pub struct MigrationBatch {
    tasks: Vec<Arc<MigrationTask>>,
    skipped: usize,
}

impl MigrationBatch {
    pub fn new(tasks: Vec<MigrationTask>) -> Self {
        Self { tasks: tasks.into_iter().map(Arc::new).collect(), skipped: 0 }
    }

    /// Record offline pages the planner could not turn into tasks.
    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    /// Offline pages left out of the batch. Their legacy artifacts are
    /// still unconverted, so the migration cannot be complete.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MigrationTask>> {
        self.tasks.iter()
    }

    /// Number of tasks whose document has been written.
    pub fn rendered_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.rendered_available()).count()
    }
}
