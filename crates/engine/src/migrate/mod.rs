//! One-time migration of saved pages from the legacy response cache to
//! rendered documents.
//!
//! ```text
//! PageSource → MigrationPlanner → (empty: mark complete)
//!            → Renderer::ready → ConversionOrchestrator → CompletionGate
//! ```
//!
//! The batch is built per run and passed explicitly between the stages.
//! The legacy cache is only deleted when the gate sees every document on
//! disk; otherwise the flag stays unset and the next run starts over.

pub mod gate;
pub mod orchestrator;
pub mod planner;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;

use savedpages_core::{AppConfig, ConvertedCacheStore, Error, LegacyCacheStore, PageSource, SettingsStore};

use crate::render::Renderer;

pub use gate::{CompletionGate, GateVerdict};
pub use orchestrator::{
    CompletionTracker, ConversionOrchestrator, ConversionReport, FailureKind, TaskReport, TaskStatus,
};
pub use planner::MigrationPlanner;
pub use task::{MigrationBatch, MigrationTask};

/// What a migration run did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The flag was already set; nothing was touched.
    AlreadyComplete,
    /// No page is kept offline; the flag was set.
    NothingToMigrate,
    /// Offline pages exist but none could be planned; the flag was left
    /// untouched.
    Unplannable { skipped: usize },
    /// Pages were converted. `verdict` is `None` when the batch never
    /// reached its final completion and the gate was not run.
    Finished { report: ConversionReport, verdict: Option<GateVerdict> },
}

impl MigrationOutcome {
    /// Whether the legacy cache no longer needs migrating.
    pub fn is_complete(&self) -> bool {
        match self {
            MigrationOutcome::AlreadyComplete | MigrationOutcome::NothingToMigrate => true,
            MigrationOutcome::Unplannable { .. } => false,
            MigrationOutcome::Finished { verdict, .. } => verdict.as_ref().is_some_and(|v| v.all_complete),
        }
    }
}

/// Wires planner, renderer, orchestrator and gate together.
pub struct Migrator {
    source: Arc<dyn PageSource>,
    settings: Arc<dyn SettingsStore>,
    renderer: Arc<dyn Renderer>,
    planner: MigrationPlanner,
    orchestrator: ConversionOrchestrator,
    gate: CompletionGate,
}

impl Migrator {
    pub fn new(
        config: &AppConfig, source: Arc<dyn PageSource>, settings: Arc<dyn SettingsStore>, renderer: Arc<dyn Renderer>,
    ) -> Self {
        let legacy = LegacyCacheStore::new(&config.legacy_cache_dir);
        let converted = ConvertedCacheStore::new(&config.converted_dir, config.write_mode);

        let orchestrator = ConversionOrchestrator::new(legacy.clone(), converted.clone(), Arc::clone(&renderer))
            .with_render_timeout(config.render_timeout())
            .with_max_concurrency(config.max_concurrency)
            .with_skip_converted(config.skip_converted);

        let gate = CompletionGate::new(converted, legacy, Arc::clone(&settings));
        let planner = MigrationPlanner::new(config.rest_api_prefix.clone());

        Self { source, settings, renderer, planner, orchestrator, gate }
    }

    /// Run the migration unless it already completed.
    pub async fn run(&self) -> Result<MigrationOutcome, Error> {
        if self.settings.is_migration_complete().await? {
            tracing::info!("saved page conversion already complete");
            return Ok(MigrationOutcome::AlreadyComplete);
        }
        self.run_forced().await
    }

    /// Run the migration regardless of the stored flag.
    ///
    /// # Errors
    ///
    /// Fails with `Error::EngineUnavailable` if the renderer cannot start;
    /// the stored flag is left untouched in that case. Planning and gate
    /// errors are also returned. Per-page failures are not errors; they
    /// are reported in the outcome.
    pub async fn run_forced(&self) -> Result<MigrationOutcome, Error> {
        let batch = self.planner.plan(self.source.as_ref()).await?;

        if batch.is_empty() && batch.skipped() > 0 {
            tracing::warn!(skipped = batch.skipped(), "no saved page could be planned; leaving flag unset");
            return Ok(MigrationOutcome::Unplannable { skipped: batch.skipped() });
        }

        if batch.is_empty() {
            self.settings.set_migration_complete(true).await?;
            tracing::info!("no saved pages to convert");
            return Ok(MigrationOutcome::NothingToMigrate);
        }

        self.renderer.ready().await.map_err(Error::from)?;

        let report = self.orchestrator.convert(&batch).await;
        if !report.batch_completed {
            tracing::error!(
                total = batch.len(),
                rendered = batch.rendered_count(),
                "batch did not reach its final completion; leaving legacy cache in place"
            );
            return Ok(MigrationOutcome::Finished { report, verdict: None });
        }

        let verdict = self.gate.evaluate(&batch).await?;
        Ok(MigrationOutcome::Finished { report, verdict: Some(verdict) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savedpages_core::{ReadingList, SettingsDb, WriteMode};
    use testing::{Fixture, StubRenderer};

    struct Harness {
        fixture: Fixture,
        settings: Arc<SettingsDb>,
        config: AppConfig,
    }

    impl Harness {
        async fn new(mode: WriteMode) -> Self {
            let fixture = Fixture::with_mode(mode);
            let config = AppConfig {
                legacy_cache_dir: fixture.legacy.dir().to_path_buf(),
                converted_dir: fixture.converted.dir().to_path_buf(),
                settings_db_path: fixture.root().join("settings.sqlite"),
                write_mode: mode,
                max_concurrency: 16,
                render_timeout_ms: 2_000,
                ..Default::default()
            };
            let settings = Arc::new(SettingsDb::open(&config.settings_db_path).await.unwrap());
            Self { fixture, settings, config }
        }

        fn migrator(&self, lists: Vec<ReadingList>, renderer: StubRenderer) -> Migrator {
            Migrator::new(&self.config, Arc::new(lists), self.settings.clone(), Arc::new(renderer))
        }
    }

    #[tokio::test]
    async fn test_empty_source_completes_without_rendering() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let renderer = StubRenderer::unavailable();

        let outcome = harness.migrator(Vec::new(), renderer.clone()).run().await.unwrap();

        assert!(matches!(outcome, MigrationOutcome::NothingToMigrate));
        assert!(harness.settings.is_migration_complete().await.unwrap());
        assert_eq!(renderer.submissions(), 0);
        assert!(!harness.fixture.converted.dir().exists());
    }

    #[tokio::test]
    async fn test_no_offline_pages_completes() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let mut page = Fixture::page("Paris");
        page.offline = false;
        let lists = vec![ReadingList::new("Saved", vec![page])];

        let outcome = harness.migrator(lists, StubRenderer::echo()).run().await.unwrap();
        assert!(matches!(outcome, MigrationOutcome::NothingToMigrate));
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_only_unplannable_pages_leave_flag_unset() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let opaque = savedpages_core::Page::new("Paris", url::Url::parse("data:text/plain,x").unwrap(), true);
        let lists = vec![ReadingList::new("Saved", vec![opaque])];
        let renderer = StubRenderer::echo();

        let outcome = harness.migrator(lists, renderer.clone()).run().await.unwrap();

        assert!(matches!(outcome, MigrationOutcome::Unplannable { skipped: 1 }));
        assert!(!outcome.is_complete());
        assert_eq!(renderer.submissions(), 0);
        assert_eq!(harness.settings.get_bool(savedpages_core::settings::MIGRATION_COMPLETE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_success_deletes_legacy() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let titles = ["Paris", "Berlin", "AC/DC", "Rome"];
        harness.fixture.seed_batch(&titles);
        assert_eq!(harness.fixture.legacy_file_count(), 16);

        let renderer = StubRenderer::echo();
        let outcome = harness
            .migrator(Fixture::reading_lists(&titles), renderer.clone())
            .run()
            .await
            .unwrap();

        let MigrationOutcome::Finished { report, verdict: Some(verdict) } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(report.converted, 4);
        assert!(verdict.all_complete);
        assert_eq!(verdict.deleted, 16);
        assert_eq!(renderer.submissions(), 4);
        assert_eq!(harness.fixture.legacy_file_count(), 0);
        assert!(harness.settings.is_migration_complete().await.unwrap());
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_single_failure_keeps_all_legacy() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let titles = ["Paris", "Berlin", "Rome"];
        harness.fixture.seed_batch(&titles);

        let outcome = harness
            .migrator(Fixture::reading_lists(&titles), StubRenderer::failing_for("Berlin"))
            .run()
            .await
            .unwrap();

        let MigrationOutcome::Finished { verdict: Some(verdict), .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(!verdict.all_complete);
        assert_eq!(verdict.missing, vec!["Berlin".to_string()]);
        assert_eq!(harness.fixture.legacy_file_count(), 12);
        assert!(!harness.settings.is_migration_complete().await.unwrap());
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_engine_unavailable_leaves_flag_untouched() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        harness.fixture.seed_batch(&["Paris"]);

        let result = harness
            .migrator(Fixture::reading_lists(&["Paris"]), StubRenderer::unavailable())
            .run()
            .await;

        assert!(matches!(result, Err(Error::EngineUnavailable(_))));
        assert_eq!(harness.settings.get_bool(savedpages_core::settings::MIGRATION_COMPLETE_KEY).await.unwrap(), None);
        assert_eq!(harness.fixture.legacy_file_count(), 4);
    }

    #[tokio::test]
    async fn test_already_complete_is_noop() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        harness.fixture.seed_batch(&["Paris"]);
        harness.settings.set_migration_complete(true).await.unwrap();
        let renderer = StubRenderer::echo();

        let outcome = harness
            .migrator(Fixture::reading_lists(&["Paris"]), renderer.clone())
            .run()
            .await
            .unwrap();

        assert!(matches!(outcome, MigrationOutcome::AlreadyComplete));
        assert_eq!(renderer.submissions(), 0);
        assert_eq!(harness.fixture.legacy_file_count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reverse_completion_runs_gate_once() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let titles = ["A", "B", "C", "D", "E"];
        harness.fixture.seed_batch(&titles);

        let outcome = harness
            .migrator(Fixture::reading_lists(&titles), StubRenderer::reverse(titles.len()))
            .run()
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(harness.fixture.legacy_file_count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_after_partial_failure_retries() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        let titles = ["Paris", "Berlin"];
        harness.fixture.seed_batch(&titles);
        let lists = Fixture::reading_lists(&titles);

        let first = harness
            .migrator(lists.clone(), StubRenderer::failing_for("Berlin"))
            .run()
            .await
            .unwrap();
        assert!(!first.is_complete());

        let second = harness.migrator(lists, StubRenderer::echo()).run().await.unwrap();
        assert!(second.is_complete());
        assert_eq!(harness.fixture.legacy_file_count(), 0);
        assert_eq!(harness.fixture.converted.read("Paris").await.unwrap(), "<html>Paris</html>");
    }

    #[tokio::test]
    async fn test_forced_rerun_is_idempotent_with_overwrite() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        harness.fixture.seed_batch(&["Paris"]);
        harness.fixture.converted.write("Paris", "X").await.unwrap();
        let lists = Fixture::reading_lists(&["Paris"]);

        let migrator = harness.migrator(lists, StubRenderer::echo());
        let first = migrator.run_forced().await.unwrap();
        harness.fixture.seed_batch(&["Paris"]);
        let second = migrator.run_forced().await.unwrap();

        assert_eq!(first.is_complete(), second.is_complete());
        assert_eq!(harness.fixture.converted.read("Paris").await.unwrap(), "<html>Paris</html>");
        assert_eq!(harness.fixture.converted.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_mode_accumulates_on_rerun() {
        let harness = Harness::new(WriteMode::Append).await;
        harness.fixture.seed_batch(&["Paris"]);
        harness.fixture.converted.write("Paris", "X").await.unwrap();

        harness
            .migrator(Fixture::reading_lists(&["Paris"]), StubRenderer::echo())
            .run()
            .await
            .unwrap();

        assert_eq!(harness.fixture.converted.read("Paris").await.unwrap(), "X<html>Paris</html>");
    }

    #[tokio::test]
    async fn test_outcome_serializes_for_reporting() {
        let harness = Harness::new(WriteMode::Overwrite).await;
        harness.fixture.seed_batch(&["Paris"]);

        let outcome = harness
            .migrator(Fixture::reading_lists(&["Paris"]), StubRenderer::echo())
            .run()
            .await
            .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "finished");
        assert_eq!(json["report"]["tasks"][0]["status"], "converted");
        assert_eq!(json["verdict"]["all_complete"], true);
    }
}
