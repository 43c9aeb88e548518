//! Small file helpers shared by the cache stores.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::Error;

static ILLEGAL_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[:\\/*"?|<>']"#).expect("static regex is valid"));

/// Subdirectory that stages overwrite writes before the rename.
///
/// Contains a character [`sanitize_filename`] always replaces, so no
/// sanitized title can name it or anything inside the store next to it.
pub const STAGING_DIR: &str = "'staging";

/// How a write treats an existing target file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace the file atomically.
    #[default]
    Overwrite,
    /// Append to whatever is already there.
    Append,
}

/// Replace characters that are illegal in file names with `_`.
///
/// Names that would resolve to the directory itself or its parent are
/// made literal as well.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized = ILLEGAL_FILENAME_CHARS.replace_all(name, "_").into_owned();
    match sanitized.as_str() {
        "" => "_".to_string(),
        "." | ".." => sanitized.replace('.', "_"),
        _ => sanitized,
    }
}

/// Read a whole file as UTF-8 text.
pub async fn read_to_string(path: &Path) -> Result<String, Error> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::io(path.display().to_string(), e),
    })
}

/// Write `content` to `dir/file_name`, creating `dir` if needed.
///
/// `file_name` must already be sanitized. Overwrites are staged under
/// [`STAGING_DIR`] and renamed into place. Callers serialize concurrent
/// writers to the same file.
pub async fn write_in_dir(dir: &Path, file_name: &str, content: &str, mode: WriteMode) -> Result<(), Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(dir.display().to_string(), e))?;

    let target = dir.join(file_name);
    match mode {
        WriteMode::Overwrite => {
            let staging = dir.join(STAGING_DIR);
            tokio::fs::create_dir_all(&staging)
                .await
                .map_err(|e| Error::io(staging.display().to_string(), e))?;

            let staged = staging.join(file_name);
            let mut file = tokio::fs::File::create(&staged)
                .await
                .map_err(|e| Error::io(staged.display().to_string(), e))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| Error::io(staged.display().to_string(), e))?;
            file.sync_all()
                .await
                .map_err(|e| Error::io(staged.display().to_string(), e))?;
            drop(file);

            if let Err(e) = tokio::fs::rename(&staged, &target).await {
                let _ = tokio::fs::remove_file(&staged).await;
                return Err(Error::io(target.display().to_string(), e));
            }
        }
        WriteMode::Append => {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&target)
                .await
                .map_err(|e| Error::io(target.display().to_string(), e))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| Error::io(target.display().to_string(), e))?;
            file.sync_all()
                .await
                .map_err(|e| Error::io(target.display().to_string(), e))?;
        }
    }

    Ok(())
}

/// Remove a file or directory tree. Missing paths are not an error.
///
/// Returns whether anything was removed.
pub async fn delete_recursive(path: &Path) -> Result<bool, Error> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(path.display().to_string(), e)),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path.display().to_string(), e)),
    }
}
