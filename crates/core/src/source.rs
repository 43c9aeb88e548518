//! Reading-list page sources.
//!
//! The migration only reads the lists. [`JsonPageSource`] loads them from a
//! JSON export of the reading-list database:
//!
//! ```json
//! [
//!   {
//!     "title": "Saved",
//!     "pages": [
//!       { "api_title": "Paris", "wiki_origin": "https://en.wikipedia.org", "offline": true }
//!     ]
//!   }
//! ]
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::files;

/// A saved page inside a reading list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Title as used in API paths. May contain HTML entities.
    pub api_title: String,
    /// Origin of the wiki the page belongs to, e.g. `https://en.wikipedia.org`.
    pub wiki_origin: Url,
    /// Whether the page is kept available offline.
    #[serde(default)]
    pub offline: bool,
}

impl Page {
    pub fn new(api_title: impl Into<String>, wiki_origin: Url, offline: bool) -> Self {
        Self { api_title: api_title.into(), wiki_origin, offline }
    }

    pub fn is_kept_offline(&self) -> bool {
        self.offline
    }

    pub fn api_title(&self) -> &str {
        &self.api_title
    }

    pub fn wiki_origin(&self) -> &Url {
        &self.wiki_origin
    }
}

/// A named, ordered list of saved pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingList {
    pub title: String,
    #[serde(default)]
    pages: Vec<Page>,
}

impl ReadingList {
    pub fn new(title: impl Into<String>, pages: Vec<Page>) -> Self {
        Self { title: title.into(), pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }
}

/// Enumerates every reading list, in storage order.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn reading_lists(&self) -> Result<Vec<ReadingList>, Error>;
}

/// Reading lists loaded from a JSON export file.
///
/// A missing file means the user never saved anything.
#[derive(Debug, Clone)]
pub struct JsonPageSource {
    path: PathBuf,
}

impl JsonPageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for JsonPageSource {
    async fn reading_lists(&self) -> Result<Vec<ReadingList>, Error> {
        let raw = match files::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(Error::NotFound(_)) => {
                tracing::debug!(path = %self.path.display(), "no reading list export found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        serde_json::from_str(&raw)
            .map_err(|e| Error::PageSource(format!("{}: {e}", self.path.display())))
    }
}

/// In-memory lists, useful for embedding and tests.
#[async_trait]
impl PageSource for Vec<ReadingList> {
    async fn reading_lists(&self) -> Result<Vec<ReadingList>, Error> {
        Ok(self.clone())
    }
}
