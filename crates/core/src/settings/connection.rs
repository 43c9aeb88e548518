//! Opening the settings database.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// Applied on every open.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA busy_timeout=5000;";

/// Handle to the SQLite settings database.
///
/// Cloning shares the same background connection thread.
#[derive(Clone, Debug)]
pub struct SettingsDb {
    pub(crate) conn: Connection,
}

impl SettingsDb {
    /// Open (or create) the database file at `path` and bring its schema up
    /// to date. Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }

        tracing::debug!(path = %path.display(), "opening settings database");
        Self::prepare(Connection::open(path).await?).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::prepare(Connection::open_in_memory().await?).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await?;
        migrations::run(&conn).await?;
        Ok(Self { conn })
    }
}
