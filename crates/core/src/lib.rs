//! Core types and shared functionality for the saved-pages migration.
//!
//! This crate provides:
//! - Legacy and converted on-disk cache stores
//! - The SQLite-backed settings store holding the migration flag
//! - Reading-list page sources
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod settings;
pub mod source;

pub use cache::{CacheKey, ConvertedCacheStore, LegacyCacheStore, WriteMode, cache_key};
pub use config::{AppConfig, ConfigError, RendererKind};
pub use error::Error;
pub use settings::{SettingsDb, SettingsStore};
pub use source::{JsonPageSource, Page, PageSource, ReadingList};
