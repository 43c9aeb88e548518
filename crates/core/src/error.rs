//! Unified error types for the saved-pages migration.
//!
//! Display strings carry a stable code prefix so operator logs can be
//! grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the migration pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A legacy artifact is missing.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// File operation failed.
    #[error("IO_FAILURE: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The renderer reported or implied failure for one document.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),

    /// The renderer could not be started; nothing can be converted.
    #[error("ENGINE_UNAVAILABLE: {0}")]
    EngineUnavailable(String),

    /// Reading lists could not be enumerated.
    #[error("PAGE_SOURCE: {0}")]
    PageSource(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("SETTINGS_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Settings schema migration failed to apply.
    #[error("SETTINGS_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid cache key format.
    #[error("CACHE_ERROR: invalid cache key: {0}")]
    InvalidHash(String),
}

impl Error {
    /// Wrap an I/O error with the path or action it came from.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io { context: context.into(), source }
    }

    /// True for a missing legacy artifact.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
