//! Write access to the converted-document store.
//!
//! Documents are keyed by page title. Titles are sanitized into file names
//! and writers to the same file are serialized through a per-name lock.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::files::{self, WriteMode};
use crate::Error;

type FileLocks = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Directory of rendered documents named by sanitized title.
#[derive(Clone, Debug)]
pub struct ConvertedCacheStore {
    dir: PathBuf,
    mode: WriteMode,
    locks: FileLocks,
}

impl ConvertedCacheStore {
    pub fn new(dir: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self { dir: dir.into(), mode, locks: Arc::default() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name a title is stored under.
    pub fn file_name(title: &str) -> String {
        files::sanitize_filename(title)
    }

    /// Persist a rendered document for `title`.
    ///
    /// Creates the store directory on first use. Existing documents are
    /// replaced or appended to according to the store's [`WriteMode`].
    pub async fn write(&self, title: &str, content: &str) -> Result<(), Error> {
        let file_name = Self::file_name(title);
        let lock = self.lock_for(&file_name);
        let _guard = lock.lock().await;

        files::write_in_dir(&self.dir, &file_name, content, self.mode).await?;
        tracing::debug!(title, file = %file_name, bytes = content.len(), "wrote converted document");
        Ok(())
    }

    /// Names of all finished documents. A missing directory lists as empty.
    ///
    /// Only regular files are documents; the staging directory is skipped.
    pub async fn list(&self) -> Result<HashSet<String>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(Error::io(self.dir.display().to_string(), e)),
        };

        let mut names = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(self.dir.display().to_string(), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path().display().to_string(), e))?;
            if file_type.is_file() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Whether a document for `title` exists.
    pub async fn exists(&self, title: &str) -> Result<bool, Error> {
        let path = self.dir.join(Self::file_name(title));
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::io(path.display().to_string(), e))
    }

    /// Read back the document for `title`.
    pub async fn read(&self, title: &str) -> Result<String, Error> {
        files::read_to_string(&self.dir.join(Self::file_name(title))).await
    }

    fn lock_for(&self, file_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(file_name.to_string()).or_default().clone()
    }
}
