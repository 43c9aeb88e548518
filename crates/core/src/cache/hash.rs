//! Content-addressed cache key generation.
//!
//! Legacy cache files are named `<md5 hex of request url>.<generation>`.
//! MD5 is kept because it is the naming scheme of the files already on disk.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};

use crate::Error;

/// Generation suffix of the primary (response body) artifact.
pub const PRIMARY_GENERATION: u8 = 1;

/// Stable cache key: a lowercase hex digest plus a single-digit generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CacheKey {
    hash: String,
    generation: u8,
}

impl CacheKey {
    /// Hex digest part of the key.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn generation(&self) -> u8 {
        self.generation
    }

    /// Same digest, one generation older. `None` for generation 0.
    pub fn prior_generation(&self) -> Option<CacheKey> {
        self.generation
            .checked_sub(1)
            .map(|generation| CacheKey { hash: self.hash.clone(), generation })
    }

    /// File name of the artifact this key addresses.
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.hash, self.generation)
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    /// Parse a legacy cache file name such as `0123...cdef.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, generation) = s.rsplit_once('.').ok_or_else(|| Error::InvalidHash(s.to_string()))?;

        let valid_hash = hash.len() == 32 && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        let valid_generation = generation.len() == 1 && generation.bytes().all(|b| b.is_ascii_digit());
        if !valid_hash || !valid_generation {
            return Err(Error::InvalidHash(s.to_string()));
        }

        let generation = generation.parse().map_err(|_| Error::InvalidHash(s.to_string()))?;
        Ok(CacheKey { hash: hash.to_string(), generation })
    }
}

/// Compute the primary-generation cache key for a request URL.
pub fn cache_key(url: &str) -> CacheKey {
    let digest = Md5::digest(url.as_bytes());
    CacheKey { hash: hex::encode(digest), generation: PRIMARY_GENERATION }
}
