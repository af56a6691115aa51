//! In-process cache storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashlink::LinkedHashMap;
use parking_lot::Mutex;

use crate::types::{CacheKey, Response};

use super::{CacheRegion, CacheStorage, Result};

/// Regions kept in memory for the lifetime of the process. Clones share the same regions.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStorage {
    regions: Arc<Mutex<HashMap<String, MemoryRegion>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    type Region = MemoryRegion;

    async fn open(&self, name: &str) -> Result<MemoryRegion> {
        let mut regions = self.regions.lock();
        let region = regions.entry(name.to_string()).or_insert_with(|| MemoryRegion::new(name));
        Ok(region.clone())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.regions.lock().contains_key(name))
    }
}

/// Insertion-ordered map of entries behind a mutex.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    name: Arc<str>,
    entries: Arc<Mutex<LinkedHashMap<CacheKey, Response>>>,
    sealed: Arc<AtomicBool>,
}

impl MemoryRegion {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            entries: Arc::new(Mutex::new(LinkedHashMap::new())),
            sealed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl CacheRegion for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Response>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put_all(&self, entries: Vec<(CacheKey, Response)>) -> Result<()> {
        let mut guard = self.entries.lock();
        for (key, response) in entries {
            guard.replace(key, response);
        }
        Ok(())
    }

    async fn seal(&self) -> Result<()> {
        self.sealed.store(true, Ordering::Release);
        Ok(())
    }

    async fn is_sealed(&self) -> Result<bool> {
        Ok(self.sealed.load(Ordering::Acquire))
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
