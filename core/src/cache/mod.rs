//! Named cache regions holding request/response pairs.
//!
//! A [`CacheStorage`] hands out [`CacheRegion`] handles by name, creating the region on first
//! open. Two backends are provided: [`MemoryCacheStorage`] for in-process use and tests, and
//! [`DiskCacheStorage`] which persists entries under a root directory.

use std::future::Future;

use http::Method;

use crate::error::CacheError;
use crate::types::{CacheKey, Request, Response};

pub mod disk;
pub mod memory;

pub use disk::{DiskCacheStorage, DiskRegion};
pub use memory::{MemoryCacheStorage, MemoryRegion};

pub type Result<T> = std::result::Result<T, CacheError>;

/// A single named set of cached responses.
pub trait CacheRegion: Send + Sync {
    /// Name the region was opened with.
    fn name(&self) -> &str;

    /// Fetch the entry stored under `key`.
    fn get(&self, key: &CacheKey) -> impl Future<Output = Result<Option<Response>>> + Send;

    /// Store a batch of entries, replacing any existing entry for the same key.
    ///
    /// The batch is all-or-nothing: on error the region holds exactly what it held before.
    fn put_all(
        &self,
        entries: Vec<(CacheKey, Response)>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Record that the region holds a completed install.
    fn seal(&self) -> impl Future<Output = Result<()>> + Send;

    /// Whether [`CacheRegion::seal`] was ever called on this region.
    fn is_sealed(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Keys currently stored in the region.
    fn keys(&self) -> impl Future<Output = Result<Vec<CacheKey>>> + Send;

    /// Match a request against the region. Only `GET` requests can match.
    fn lookup(&self, request: &Request) -> impl Future<Output = Result<Option<Response>>> + Send {
        let key = (request.method == Method::GET).then(|| request.cache_key());
        async move {
            match key {
                Some(key) => self.get(&key).await,
                None => Ok(None),
            }
        }
    }

    fn len(&self) -> impl Future<Output = Result<usize>> + Send {
        async move { Ok(self.keys().await?.len()) }
    }
}

/// Registry of cache regions addressed by name.
pub trait CacheStorage: Send + Sync {
    type Region: CacheRegion;

    /// Open the region called `name`, creating it if absent.
    fn open(&self, name: &str) -> impl Future<Output = Result<Self::Region>> + Send;

    /// Whether a region called `name` exists.
    fn has(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;
}
