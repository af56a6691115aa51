//! Error taxonomy for the install and fetch paths.

use thiserror::Error;

/// A live fetch could not reach the server.
///
/// HTTP error statuses are not network errors; they come back as ordinary responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {url} failed: {reason}")]
pub struct NetworkError {
    pub url: String,
    pub reason: String,
}

impl NetworkError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { url: url.into(), reason: reason.into() }
    }
}

/// A cache backend failed to read or write its storage.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage i/o failed")]
    Io(#[from] std::io::Error),
    #[error("malformed cache entry metadata")]
    Metadata(#[from] serde_json::Error),
    #[error("cache entry records an invalid url {0:?}")]
    InvalidUrl(String),
    #[error("cache worker failed: {0}")]
    Worker(String),
}

/// Pre-populating the cache region failed. Nothing from the attempt is stored.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("manifest entry {path:?} cannot be resolved against the origin")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("manifest lists {0} more than once")]
    Duplicate(String),
    #[error("fetching manifest entry {path} failed")]
    Fetch {
        path: String,
        #[source]
        source: NetworkError,
    },
    #[error("manifest entry {path} returned status {status}")]
    BadStatus { path: String, status: u16 },
    #[error("storing the manifest failed")]
    Cache(#[from] CacheError),
}

/// A request could not be resolved by any strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The network failed and no fallback applies.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// The network failed and the cache region has no entry for the request.
    #[error("offline and no cached response for {key}")]
    Offline {
        key: String,
        #[source]
        source: NetworkError,
    },
    #[error("cache lookup failed")]
    Cache(#[from] CacheError),
}
