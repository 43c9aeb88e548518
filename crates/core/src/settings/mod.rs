//! Persisted application settings.
//!
//! The conversion flag lives in a small key/value table.

pub mod connection;
pub mod migrations;

use async_trait::async_trait;
use tokio_rusqlite::{params, rusqlite};

pub use connection::SettingsDb;

use crate::Error;

/// Settings key of the one-time conversion flag.
pub const MIGRATION_COMPLETE_KEY: &str = "offline_pcs_to_mobile_html_conversion_complete";

/// Storage for the "migration complete" flag.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_migration_complete(&self, complete: bool) -> Result<(), Error>;

    /// Unset flags read as `false`.
    async fn is_migration_complete(&self) -> Result<bool, Error>;
}

impl SettingsDb {
    /// Store a boolean setting.
    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), Error> {
        let key = key.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value.to_string(), now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Read a boolean setting. Returns None if it was never written.
    pub async fn get_bool(&self, key: &str) -> Result<Option<bool>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<bool>, Error> {
                let result = conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                });

                match result {
                    Ok(value) => Ok(Some(value == "true")),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl SettingsStore for SettingsDb {
    async fn set_migration_complete(&self, complete: bool) -> Result<(), Error> {
        self.set_bool(MIGRATION_COMPLETE_KEY, complete).await
    }

    async fn is_migration_complete(&self) -> Result<bool, Error> {
        Ok(self.get_bool(MIGRATION_COMPLETE_KEY).await?.unwrap_or(false))
    }
}
