//! Checks applied to a loaded [`AppConfig`].

use crate::config::AppConfig;
use thiserror::Error;

/// Why a configuration could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Reject values the migration cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if a required path is empty, and
    /// `ConfigError::Invalid` if:
    /// - `render_timeout_ms` is less than 100ms or exceeds 10 minutes
    /// - `max_concurrency` is 0 or exceeds 64
    /// - `rest_api_prefix` does not start with `/`
    /// - legacy and converted directories are the same path
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path, hint) in [
            ("legacy_cache_dir", &self.legacy_cache_dir, "set SAVEDPAGES_LEGACY_CACHE_DIR"),
            ("converted_dir", &self.converted_dir, "set SAVEDPAGES_CONVERTED_DIR"),
            ("settings_db_path", &self.settings_db_path, "set SAVEDPAGES_SETTINGS_DB_PATH"),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Missing { field: field.into(), hint: hint.into() });
            }
        }

        if self.render_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.render_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must not exceed 10 minutes (600000ms)".into(),
            });
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must be at least 1".into() });
        }
        if self.max_concurrency > 64 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must not exceed 64".into() });
        }

        if !self.rest_api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "rest_api_prefix".into(),
                reason: "must start with '/'".into(),
            });
        }

        if self.legacy_cache_dir == self.converted_dir {
            return Err(ConfigError::Invalid {
                field: "converted_dir".into(),
                reason: "must differ from legacy_cache_dir".into(),
            });
        }

        if self.skip_converted && self.write_mode == crate::cache::WriteMode::Append {
            tracing::warn!("skip_converted is set; append write_mode only applies to pages not yet converted");
        }

        Ok(())
    }
}
