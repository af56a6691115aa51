//! Counters describing how requests were resolved.
//!
//! The interceptor records every network attempt and cache lookup here. A [`StatsSnapshot`] is
//! what the CLI prints for `stats` and what tests assert on.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    network_ok: u64,
    network_failed: u64,
    cache_hits: u64,
    cache_misses: u64,
    fallbacks_served: u64,
    installs: u64,
    installed_entries: usize,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            network_ok: 0,
            network_failed: 0,
            cache_hits: 0,
            cache_misses: 0,
            fallbacks_served: 0,
            installs: 0,
            installed_entries: 0,
        }
    }
}

/// Thread-safe counter collection shared by the interceptor and its callers.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: parking_lot::Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a live fetch.
    pub fn record_network(&self, ok: bool) {
        let mut guard = self.inner.lock();
        if ok {
            guard.network_ok = guard.network_ok.saturating_add(1);
        } else {
            guard.network_failed = guard.network_failed.saturating_add(1);
        }
    }

    /// Record whether a cache lookup produced a hit.
    pub fn record_cache_lookup(&self, hit: bool) {
        let mut guard = self.inner.lock();
        if hit {
            guard.cache_hits = guard.cache_hits.saturating_add(1);
        } else {
            guard.cache_misses = guard.cache_misses.saturating_add(1);
        }
    }

    /// Record a cached response served because the network failed.
    pub fn record_fallback(&self) {
        let mut guard = self.inner.lock();
        guard.fallbacks_served = guard.fallbacks_served.saturating_add(1);
    }

    /// Record a completed install and the number of entries it stored.
    pub fn record_install(&self, entries: usize) {
        let mut guard = self.inner.lock();
        guard.installs = guard.installs.saturating_add(1);
        guard.installed_entries = entries;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let guard = self.inner.lock();

        let lookups = guard.cache_hits + guard.cache_misses;
        let cache_hit_ratio =
            if lookups == 0 { 0.0 } else { guard.cache_hits as f32 / lookups as f32 };

        StatsSnapshot {
            timestamp_ms: now_ms(),
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            network_ok: guard.network_ok,
            network_failed: guard.network_failed,
            cache_hits: guard.cache_hits,
            cache_misses: guard.cache_misses,
            cache_hit_ratio,
            fallbacks_served: guard.fallbacks_served,
            installs: guard.installs,
            installed_entries: guard.installed_entries,
        }
    }
}

fn now_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(delta) => delta.as_millis() as u64,
        Err(err) => {
            warn!("system clock error: {err}");
            0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub timestamp_ms: u64,
    pub uptime_ms: u64,
    pub network_ok: u64,
    pub network_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f32,
    pub fallbacks_served: u64,
    pub installs: u64,
    pub installed_entries: usize,
}
