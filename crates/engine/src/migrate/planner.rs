//! Builds the migration batch from the saved reading lists.

use std::collections::HashSet;

use savedpages_core::{Error, Page, PageSource};
use scraper::Html;

use super::task::{MigrationBatch, MigrationTask};

/// Endpoint of the lead-section response.
pub const LEAD_SECTION_ENDPOINT: &str = "/page/mobile-sections-lead/";

/// Endpoint of the remaining-sections response.
pub const REMAINING_SECTIONS_ENDPOINT: &str = "/page/mobile-sections-remaining/";

/// Selects pages kept offline and derives their legacy cache keys.
#[derive(Debug, Clone)]
pub struct MigrationPlanner {
    rest_api_prefix: String,
}

impl MigrationPlanner {
    pub fn new(rest_api_prefix: impl Into<String>) -> Self {
        Self { rest_api_prefix: rest_api_prefix.into() }
    }

    /// Plan one migration run.
    ///
    /// An empty batch is a normal result meaning there is nothing to
    /// convert. A page saved in several lists is planned once.
    pub async fn plan(&self, source: &dyn PageSource) -> Result<MigrationBatch, Error> {
        let lists = source.reading_lists().await?;

        let mut seen = HashSet::new();
        let mut tasks = Vec::new();
        let mut skipped = 0;
        for list in &lists {
            for page in list.pages().iter().filter(|p| p.is_kept_offline()) {
                let Some(task) = self.task_for(page) else {
                    tracing::warn!(
                        list = %list.title,
                        title = page.api_title(),
                        origin = %page.wiki_origin(),
                        "skipping saved page with opaque wiki origin"
                    );
                    skipped += 1;
                    continue;
                };

                if seen.insert(task.lead_key().clone()) {
                    tasks.push(task);
                }
            }
        }

        tracing::info!(lists = lists.len(), tasks = tasks.len(), skipped, "planned saved page conversion");
        Ok(MigrationBatch::new(tasks).with_skipped(skipped))
    }

    /// Derive the task for one page. `None` if the wiki origin has no
    /// scheme/host form to build URLs from.
    pub fn task_for(&self, page: &Page) -> Option<MigrationTask> {
        let origin = page.wiki_origin().origin();
        if !origin.is_tuple() {
            return None;
        }
        let origin = origin.ascii_serialization();
        let title = decode_title(page.api_title());

        let lead_url = format!("{origin}{}{LEAD_SECTION_ENDPOINT}{title}", self.rest_api_prefix);
        let remaining_url = format!("{origin}{}{REMAINING_SECTIONS_ENDPOINT}{title}", self.rest_api_prefix);

        Some(MigrationTask::new(title, lead_url, remaining_url))
    }
}

/// Decode HTML entities (and drop markup) in an API title.
pub fn decode_title(api_title: &str) -> String {
    if !api_title.contains(['&', '<']) {
        return api_title.to_string();
    }
    Html::parse_fragment(api_title).root_element().text().collect()
}
