//! Migration settings, merged by figment from (highest first):
//!
//! 1. `SAVEDPAGES_*` environment variables
//! 2. the TOML file named by `SAVEDPAGES_CONFIG_FILE`, if any
//! 3. [`AppConfig::default`]

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::WriteMode;

mod validation;

pub use validation::ConfigError;

/// Which rendering engine converts the legacy responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Built-in rule-based mobile-sections renderer.
    #[default]
    Sections,
    /// Headless browser running the bundled converter assets.
    Headless,
}

/// Paths, renderer choice and tuning for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory of the legacy response cache.
    ///
    /// Set via SAVEDPAGES_LEGACY_CACHE_DIR environment variable.
    #[serde(default = "default_legacy_cache_dir")]
    pub legacy_cache_dir: PathBuf,

    /// Directory converted documents are written to.
    ///
    /// Set via SAVEDPAGES_CONVERTED_DIR environment variable.
    #[serde(default = "default_converted_dir")]
    pub converted_dir: PathBuf,

    /// Path to the SQLite settings database.
    ///
    /// Set via SAVEDPAGES_SETTINGS_DB_PATH environment variable.
    #[serde(default = "default_settings_db_path")]
    pub settings_db_path: PathBuf,

    /// Path to the reading-list JSON export.
    ///
    /// Set via SAVEDPAGES_READING_LISTS_PATH environment variable.
    #[serde(default = "default_reading_lists_path")]
    pub reading_lists_path: PathBuf,

    /// Converter page loaded by the headless renderer.
    ///
    /// Set via SAVEDPAGES_CONVERTER_ASSETS environment variable.
    #[serde(default = "default_converter_assets")]
    pub converter_assets: PathBuf,

    /// Rendering engine: "sections" (default) or "headless".
    ///
    /// Set via SAVEDPAGES_RENDERER environment variable.
    #[serde(default)]
    pub renderer: RendererKind,

    /// REST API path prefix used when the legacy responses were fetched.
    ///
    /// Set via SAVEDPAGES_REST_API_PREFIX environment variable.
    #[serde(default = "default_rest_api_prefix")]
    pub rest_api_prefix: String,

    /// Per-document render deadline in milliseconds.
    ///
    /// Set via SAVEDPAGES_RENDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Maximum number of documents converted at once.
    ///
    /// Set via SAVEDPAGES_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How an existing converted document is treated: "overwrite" or "append".
    ///
    /// Set via SAVEDPAGES_WRITE_MODE environment variable.
    #[serde(default)]
    pub write_mode: WriteMode,

    /// Skip pages whose converted document already exists.
    ///
    /// Set via SAVEDPAGES_SKIP_CONVERTED environment variable.
    #[serde(default)]
    pub skip_converted: bool,
}

fn default_legacy_cache_dir() -> PathBuf {
    PathBuf::from("./files/okhttp-cache")
}

fn default_converted_dir() -> PathBuf {
    PathBuf::from("./files/converted-files")
}

fn default_settings_db_path() -> PathBuf {
    PathBuf::from("./files/settings.sqlite")
}

fn default_reading_lists_path() -> PathBuf {
    PathBuf::from("./files/reading_lists.json")
}

fn default_converter_assets() -> PathBuf {
    PathBuf::from("./assets/pcs-html-converter/index.html")
}

fn default_rest_api_prefix() -> String {
    "/api/rest_v1".into()
}

fn default_render_timeout_ms() -> u64 {
    60_000
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            legacy_cache_dir: default_legacy_cache_dir(),
            converted_dir: default_converted_dir(),
            settings_db_path: default_settings_db_path(),
            reading_lists_path: default_reading_lists_path(),
            converter_assets: default_converter_assets(),
            renderer: RendererKind::Sections,
            rest_api_prefix: default_rest_api_prefix(),
            render_timeout_ms: default_render_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            write_mode: WriteMode::Overwrite,
            skip_converted: false,
        }
    }
}

impl AppConfig {
    /// Render deadline as Duration for use with tokio.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Merge every source and validate the result.
    ///
    /// # Errors
    ///
    /// `ConfigError::LoadFailed` when a source cannot be read or parsed,
    /// otherwise whatever [`AppConfig::validate`] rejects.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SAVEDPAGES_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(Env::prefixed("SAVEDPAGES_").ignore(&["config_file"])))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
