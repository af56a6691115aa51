//! Request routing and the two resolution strategies.

use tracing::{debug, warn};

use crate::cache::CacheRegion;
use crate::error::FetchError;
use crate::network::Network;
use crate::stats::StatsCollector;
use crate::types::{Request, Response};

/// Which kind of request the interceptor is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A top-level page load.
    Navigation,
    /// A stylesheet, script or image.
    StaticAsset,
    Default,
}

impl Route {
    /// Navigation takes precedence over the destination.
    pub fn classify(request: &Request) -> Self {
        if request.is_navigation() {
            Self::Navigation
        } else if request.destination.is_static_asset() {
            Self::StaticAsset
        } else {
            Self::Default
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Self::Navigation | Self::Default => Strategy::NetworkFirst,
            Self::StaticAsset => Strategy::CacheFirst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Live fetch, cache lookup only if the network fails.
    NetworkFirst,
    /// Cache lookup, live fetch only on a miss. Misses are not written back.
    CacheFirst,
}

impl Strategy {
    pub async fn resolve<R, N>(
        self,
        region: &R,
        network: &N,
        request: &Request,
        stats: &StatsCollector,
    ) -> Result<Response, FetchError>
    where
        R: CacheRegion,
        N: Network,
    {
        match self {
            Self::NetworkFirst => network_first(region, network, request, stats).await,
            Self::CacheFirst => cache_first(region, network, request, stats).await,
        }
    }
}

pub async fn network_first<R, N>(
    region: &R,
    network: &N,
    request: &Request,
    stats: &StatsCollector,
) -> Result<Response, FetchError>
where
    R: CacheRegion,
    N: Network,
{
    let network_err = match network.fetch(request).await {
        Ok(response) => {
            stats.record_network(true);
            return Ok(response);
        }
        Err(err) => {
            stats.record_network(false);
            err
        }
    };

    warn!(url = %request.url, error = %network_err, "network failed, falling back to cache");
    match region.lookup(request).await? {
        Some(cached) => {
            stats.record_cache_lookup(true);
            stats.record_fallback();
            Ok(cached)
        }
        None => {
            stats.record_cache_lookup(false);
            Err(FetchError::Offline { key: request.cache_key().to_string(), source: network_err })
        }
    }
}

pub async fn cache_first<R, N>(
    region: &R,
    network: &N,
    request: &Request,
    stats: &StatsCollector,
) -> Result<Response, FetchError>
where
    R: CacheRegion,
    N: Network,
{
    if let Some(cached) = region.lookup(request).await? {
        stats.record_cache_lookup(true);
        debug!(url = %request.url, region = region.name(), "served from cache");
        return Ok(cached);
    }
    stats.record_cache_lookup(false);

    let response = network.fetch(request).await;
    stats.record_network(response.is_ok());
    Ok(response?)
}
