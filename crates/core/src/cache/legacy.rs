//! Read/delete access to the legacy response cache.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::files;
use super::hash::CacheKey;
use crate::Error;

/// Legacy cache directory holding raw API responses named by [`CacheKey`].
#[derive(Clone, Debug)]
pub struct LegacyCacheStore {
    dir: PathBuf,
}

impl LegacyCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read the raw artifact for `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when no artifact exists for the key.
    pub async fn read(&self, key: &CacheKey) -> Result<Bytes, Error> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(key.file_name())),
            Err(e) => Err(Error::io(path.display().to_string(), e)),
        }
    }

    /// Remove the artifact for `key`. Already-absent artifacts are fine.
    ///
    /// Returns whether anything was removed.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, Error> {
        let removed = files::delete_recursive(&self.path_for(key)).await?;
        if removed {
            tracing::debug!(key = %key, "deleted legacy artifact");
        }
        Ok(removed)
    }

    /// Keys of every artifact in the directory.
    ///
    /// Files whose names are not cache keys are skipped. A missing
    /// directory lists as empty.
    pub async fn keys(&self) -> Result<Vec<CacheKey>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(self.dir.display().to_string(), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(self.dir.display().to_string(), e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.parse::<CacheKey>() {
                Ok(key) => keys.push(key),
                Err(_) => tracing::debug!(file = %name, "ignoring non-cache file in legacy directory"),
            }
        }
        Ok(keys)
    }

    /// Remove the artifact one generation older than `key`, if any.
    pub async fn delete_prior_generation(&self, key: &CacheKey) -> Result<bool, Error> {
        match key.prior_generation() {
            Some(prior) => self.delete(&prior).await,
            None => Ok(false),
        }
    }
}
