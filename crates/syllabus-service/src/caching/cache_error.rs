use std::time::Duration;

use thiserror::Error;

/// An error that happens when resolving a content module.
///
/// Errors are cloned to every waiter of a coalesced load, which is why this type is
/// [`Clone`] and carries its details as owned strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The module identifier is not declared and no fallback module applies, or the
    /// backing resource does not exist.
    #[error("not found")]
    NotFound,
    /// The module was read successfully, but could not be decoded into the expected
    /// payload shape.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The fetch did not complete within the configured limit.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The backing resource exists but could not be read.
    ///
    /// The attached string contains the underlying I/O error.
    #[error("read failed: {0}")]
    ReadError(String),
    /// The content service was shut down and does not accept new loads.
    #[error("content service is shut down")]
    ShutDown,
    /// An unexpected error in the loader itself, such as a fetch task that panicked.
    #[error("internal error")]
    InternalError,
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::ReadError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl CacheError {
    /// A short, stable name of the error variant used to tag metrics.
    pub fn metrics_tag(&self) -> &'static str {
        match self {
            Self::NotFound => "notfound",
            Self::Malformed(_) => "malformed",
            Self::Timeout(_) => "timeout",
            Self::ReadError(_) => "readerror",
            Self::ShutDown => "shutdown",
            Self::InternalError => "internal",
        }
    }
}

/// The outcome of loading a module: either `Ok(T)` or the reason why it could not be
/// resolved.
pub type CacheContents<T = ()> = Result<T, CacheError>;
