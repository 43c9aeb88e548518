//! On-disk caches involved in the saved-pages migration.
//!
//! - `legacy`: raw API responses named by a content hash of the request URL
//! - `converted`: rendered documents named by sanitized page title
//! - `hash`: the deterministic URL → [`CacheKey`] mapping
//! - `files`: shared file helpers (sanitizing, writing, recursive delete)

pub mod converted;
pub mod files;
pub mod hash;
pub mod legacy;

pub use crate::Error;

pub use converted::ConvertedCacheStore;
pub use files::{WriteMode, sanitize_filename};
pub use hash::{CacheKey, cache_key};
pub use legacy::LegacyCacheStore;
