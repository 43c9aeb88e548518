//! Decides whether the legacy cache may be dropped.
//!
//! The converted directory is the source of truth: a task only counts when
//! it was marked rendered and its document is actually on disk. Cleanup is
//! all-or-nothing.

use std::sync::Arc;

use serde::Serialize;

use savedpages_core::{CacheKey, ConvertedCacheStore, Error, LegacyCacheStore, SettingsStore};

use super::task::MigrationBatch;

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub all_complete: bool,
    /// Titles without a converted document.
    pub missing: Vec<String>,
    /// Offline pages the planner could not turn into tasks.
    pub skipped: usize,
    /// Legacy files removed by the cleanup.
    pub deleted: usize,
    /// Cache artifacts still in the legacy directory after cleanup. These
    /// belong to responses that were never saved pages.
    pub leftover: Option<usize>,
}

pub struct CompletionGate {
    converted: ConvertedCacheStore,
    legacy: LegacyCacheStore,
    settings: Arc<dyn SettingsStore>,
}

impl CompletionGate {
    pub fn new(converted: ConvertedCacheStore, legacy: LegacyCacheStore, settings: Arc<dyn SettingsStore>) -> Self {
        Self { converted, legacy, settings }
    }

    /// Cross-check `batch` against the converted store, persist the result
    /// and, on full success, delete the legacy artifacts of every task.
    pub async fn evaluate(&self, batch: &MigrationBatch) -> Result<GateVerdict, Error> {
        let present = self.converted.list().await?;

        let missing: Vec<String> = batch
            .iter()
            .filter(|task| {
                let on_disk = present.contains(&ConvertedCacheStore::file_name(task.title()));
                if on_disk != task.rendered_available() {
                    tracing::warn!(
                        title = task.title(),
                        on_disk,
                        rendered = task.rendered_available(),
                        "converted store disagrees with task bookkeeping"
                    );
                }
                !(on_disk && task.rendered_available())
            })
            .map(|task| task.title().to_string())
            .collect();

        let skipped = batch.skipped();
        let all_complete = missing.is_empty() && skipped == 0;
        self.settings.set_migration_complete(all_complete).await?;

        if !all_complete {
            tracing::warn!(
                missing = missing.len(),
                skipped,
                total = batch.len(),
                "conversion incomplete; keeping legacy cache"
            );
            return Ok(GateVerdict { all_complete, missing, skipped, deleted: 0, leftover: None });
        }

        let deleted = self.delete_legacy(batch).await;
        let leftover = match self.legacy.keys().await {
            Ok(keys) => Some(keys.len()),
            Err(e) => {
                tracing::warn!(error = %e, "could not list legacy directory after cleanup");
                None
            }
        };
        tracing::info!(total = batch.len(), deleted, leftover, "conversion complete; legacy cache removed");
        Ok(GateVerdict { all_complete, missing, skipped, deleted, leftover })
    }

    async fn delete_legacy(&self, batch: &MigrationBatch) -> usize {
        let mut deleted = 0;
        for task in batch.iter() {
            for key in [task.lead_key(), task.remaining_key()] {
                deleted += self.delete_generations(key).await;
            }
        }
        deleted
    }

    async fn delete_generations(&self, key: &CacheKey) -> usize {
        let mut deleted = 0;
        for result in [self.legacy.delete(key).await, self.legacy.delete_prior_generation(key).await] {
            match result {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "could not delete legacy artifact"),
            }
        }
        deleted
    }
}
