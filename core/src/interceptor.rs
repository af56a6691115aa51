//! The request interceptor: an install hook that seeds the cache region and a fetch hook that
//! routes each request through a caching strategy.
//!
//! An interceptor starts out uninstalled. Until [`Interceptor::install`] succeeds (or
//! [`Interceptor::resume`] finds a sealed region left by an earlier install) it is not active and
//! every request goes straight to the network.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheRegion, CacheStorage};
use crate::config::ShimConfig;
use crate::error::{CacheError, FetchError, InstallError};
use crate::network::Network;
use crate::stats::StatsCollector;
use crate::strategy::Route;
use crate::types::{CacheKey, Request, Response};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    pub keys: Vec<CacheKey>,
}

pub struct Interceptor<S: CacheStorage, N: Network> {
    config: ShimConfig,
    storage: S,
    network: N,
    stats: Arc<StatsCollector>,
    active: RwLock<Option<Arc<S::Region>>>,
}

impl<S: CacheStorage, N: Network> fmt::Debug for Interceptor<S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("cache_name", &self.config.cache_name)
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

impl<S: CacheStorage, N: Network> Interceptor<S, N> {
    pub fn new(config: ShimConfig, storage: S, network: N) -> Self {
        Self {
            config,
            storage,
            network,
            stats: Arc::new(StatsCollector::new()),
            active: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    pub fn is_installed(&self) -> bool {
        self.active.read().is_some()
    }

    /// Fetch every manifest entry and store them in the cache region.
    ///
    /// Entries are fetched concurrently and only written once all of them succeeded, so a single
    /// failure leaves the region untouched and the interceptor uninstalled.
    pub async fn install(&self) -> Result<InstallReport, InstallError> {
        let manifest = self.config.resolve_manifest()?;
        let region = self.storage.open(&self.config.cache_name).await?;

        let fetches = manifest.into_iter().map(|(path, url)| async move {
            let request = Request::new(url);
            let fetched = self.network.fetch(&request).await;
            self.stats.record_network(fetched.is_ok());
            let response =
                fetched.map_err(|source| InstallError::Fetch { path: path.clone(), source })?;
            if !response.is_ok() {
                return Err(InstallError::BadStatus { path, status: response.status });
            }
            Ok::<_, InstallError>((request.cache_key(), response))
        });
        let entries = try_join_all(fetches).await?;

        let keys: Vec<CacheKey> = entries.iter().map(|(key, _)| key.clone()).collect();
        region.put_all(entries).await?;
        region.seal().await?;

        info!(cache = %self.config.cache_name, entries = keys.len(), "cache region seeded");
        self.stats.record_install(keys.len());
        *self.active.write() = Some(Arc::new(region));

        Ok(InstallReport { cache_name: self.config.cache_name.clone(), keys })
    }

    /// Activate against a region left behind by an earlier install, without refetching.
    ///
    /// Returns whether a region sealed by a completed install exists. A region that is missing or
    /// was left unsealed by a failed install is not activated. An interceptor that is already
    /// active stays active.
    pub async fn resume(&self) -> Result<bool, CacheError> {
        if self.is_installed() {
            return Ok(true);
        }
        if !self.storage.has(&self.config.cache_name).await? {
            return Ok(false);
        }

        let region = self.storage.open(&self.config.cache_name).await?;
        if !region.is_sealed().await? {
            debug!(cache = %self.config.cache_name, "cache region was never fully installed");
            return Ok(false);
        }
        debug!(cache = %self.config.cache_name, "resumed existing cache region");
        *self.active.write() = Some(Arc::new(region));
        Ok(true)
    }

    /// Resolve a request through the strategy its route selects.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let active = self.active.read().clone();
        let Some(region) = active else {
            debug!(url = %request.url, "interceptor inactive, passing through");
            let response = self.network.fetch(request).await;
            self.stats.record_network(response.is_ok());
            return Ok(response?);
        };

        let route = Route::classify(request);
        let strategy = route.strategy();
        debug!(url = %request.url, ?route, ?strategy, "intercepted request");
        strategy.resolve(region.as_ref(), &self.network, request, &self.stats).await
    }

    /// Keys stored in the configured region, without creating it.
    pub async fn cached_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        if !self.storage.has(&self.config.cache_name).await? {
            return Ok(Vec::new());
        }
        self.storage.open(&self.config.cache_name).await?.keys().await
    }
}
