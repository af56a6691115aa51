//! Interceptor configuration: which region to fill and with what.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InstallError;
use crate::types::CacheKey;

/// Name of the cache region seeded on install. Bumping it abandons the previous region.
pub const DEFAULT_CACHE_NAME: &str = "adore-moveis-v1";

/// Paths pre-populated into the cache region on install.
pub const DEFAULT_MANIFEST: [&str; 3] =
    ["/", "/static/css/consolidado.css", "/static/manifest.json"];

/// Origin that manifest paths and relative request URLs are resolved against.
pub const DEFAULT_ORIGIN: &str = "http://localhost:5000/";

const APP_QUALIFIER: &str = "com";
const APP_ORGANISATION: &str = "AdoreMoveis";
const APP_NAME: &str = "offline-cache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShimConfig {
    pub cache_name: String,
    pub manifest: Vec<String>,
    pub origin: Url,
    /// Root directory of the disk cache storage.
    pub storage_root: PathBuf,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|path| path.to_string()).collect(),
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid url"),
            storage_root: default_storage_root(),
        }
    }
}

impl ShimConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_storage_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn with_manifest<I, S>(mut self, manifest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = manifest.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        ensure!(!self.cache_name.trim().is_empty(), "cache name must not be empty");
        ensure!(
            !self.origin.cannot_be_a_base(),
            "origin {} cannot be used as a base url",
            self.origin
        );
        self.resolve_manifest().context("resolving manifest")?;
        Ok(())
    }

    /// Resolve every manifest path against the origin.
    ///
    /// Fails on the first path that does not resolve or that resolves to an entry already listed.
    pub fn resolve_manifest(&self) -> Result<Vec<(String, Url)>, InstallError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let url = self
                .origin
                .join(path)
                .map_err(|source| InstallError::InvalidPath { path: path.clone(), source })?;
            if !seen.insert(CacheKey::from_url(&url)) {
                return Err(InstallError::Duplicate(url.to_string()));
            }
            resolved.push((path.clone(), url));
        }
        Ok(resolved)
    }
}

fn default_storage_root() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME) {
        dirs.cache_dir().join("regions")
    } else {
        std::env::temp_dir().join("offline-cache-regions")
    }
}
