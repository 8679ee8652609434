//! Unified error types for the offcache worker.
//!
//! These follow the propagation policy of the design: per-item failures in
//! batch operations are logged and never abort the batch, and storage write
//! failures are always non-fatal to the response path that triggered them.

use tokio_rusqlite::rusqlite;

/// Unified error types for the cache worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level fetch failure (DNS, connect, TLS, timeout).
    ///
    /// Distinct from a non-success HTTP status, which is still a response.
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// A subset of a batch fetch failed (install pre-cache, external refresh).
    #[error("PARTIAL_FETCH_FAILURE: {failed} of {total} items failed")]
    PartialFetchFailure { failed: usize, total: usize },

    /// Persisting an entry failed (e.g. storage quota). Callers treat
    /// persistence as best-effort and must not abort their response path.
    #[error("STORAGE_WRITE_FAILURE: {0}")]
    StorageWrite(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// URL failed normalization.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),
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
