//! Offline request cache: seeds a named cache region on install and answers fetches
//! network-first or cache-first depending on the request.

#![deny(missing_debug_implementations)]

pub mod cache;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod log;
pub mod network;
pub mod stats;
pub mod strategy;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use cache::{CacheRegion, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use config::ShimConfig;
pub use error::{CacheError, FetchError, InstallError, NetworkError};
pub use interceptor::{InstallReport, Interceptor};
pub use network::{HttpNetwork, Network};
pub use strategy::{Route, Strategy};
pub use types::{CacheKey, Destination, Request, RequestMode, Response};

/// Returns the version of the core crate for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
