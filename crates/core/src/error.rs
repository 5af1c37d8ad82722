//! Unified error types for offshore.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offshore caching agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL could not be canonicalized into a cache key.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A tile URL pattern failed to compile.
    #[error("INVALID_PATTERN: {0}")]
    InvalidPattern(String),

    /// Network fetch failed (transport error, timeout, etc.).
    #[error("FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// Fetch response exceeded the configured body limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Neither the store nor the network could answer the request.
    #[error("OFFLINE: no cached response for {0}")]
    Offline(String),

    /// Install-time population failed; the candidate generation was discarded.
    #[error("INSTALL_ABORTED: {0}")]
    InstallAborted(String),

    /// Inbound message or push payload could not be parsed.
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Configuration failed to load or validate.
    #[error("CONFIG: {0}")]
    Config(#[from] crate::config::ConfigError),
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
