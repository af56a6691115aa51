//! Disk-backed cache storage.
//!
//! Each region is a directory under the storage root. Entries are addressed by a blake3 hash of
//! their [`CacheKey`] in a sharded layout (`ab/cd/<rest>.bin` for the body, `.json` for the
//! metadata).
//!
//! A batch is first written into a dot-prefixed staging directory inside the region, then renamed
//! into place file by file. Files it displaces are kept aside until the whole batch is in place;
//! if any rename fails, the renamed files are removed and the displaced ones restored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CacheError;
use crate::types::{CacheKey, Response};

use super::{CacheRegion, CacheStorage, Result};

const SHARD_LEN: usize = 2;
const BODY_EXT: &str = "bin";
const META_EXT: &str = "json";
const STAGING_PREFIX: &str = ".staging-";
const SEALED_MARKER: &str = ".sealed";

/// Persists regions as directories below `root`.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Create or reuse a storage root at the provided path.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn region_dir(&self, name: &str) -> PathBuf {
        self.root.join(region_dir_name(name))
    }
}

impl CacheStorage for DiskCacheStorage {
    type Region = DiskRegion;

    async fn open(&self, name: &str) -> Result<DiskRegion> {
        let region = DiskRegion { name: name.to_string(), dir: self.region_dir(name) };
        let dir = region.dir.clone();
        blocking(move || fs::create_dir_all(&dir).map_err(CacheError::from)).await?;
        Ok(region)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let dir = self.region_dir(name);
        blocking(move || Ok(dir.is_dir())).await
    }
}

/// Region names that are safe path components are used verbatim; anything else is hashed.
fn region_dir_name(name: &str) -> String {
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe { name.to_string() } else { blake3::hash(name.as_bytes()).to_hex().to_string() }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: CacheKey,
    url: String,
    status: u16,
    content_type: Option<String>,
}

/// Handle to a single on-disk region.
#[derive(Debug, Clone)]
pub struct DiskRegion {
    name: String,
    dir: PathBuf,
}

impl DiskRegion {
    /// Directory holding the region's entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve the body path for a key. The metadata sits next to it.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let hash = blake3::hash(key.as_str().as_bytes());
        let hex = hash.to_hex();
        let hex_str = hex.as_str();

        let (shard_one, remainder) = hex_str.split_at(SHARD_LEN);
        let (shard_two, remainder) = remainder.split_at(SHARD_LEN);

        self.dir.join(shard_one).join(shard_two).join(format!("{remainder}.{BODY_EXT}"))
    }

    fn read_entry(&self, key: &CacheKey) -> Result<Option<Response>> {
        let body_path = self.path_for(key);
        let meta_bytes = match fs::read(body_path.with_extension(META_EXT)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_bytes)?;
        if &meta.key != key {
            // Hash collision; treat as a miss.
            return Ok(None);
        }

        let body = match fs::read(&body_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let url = Url::parse(&meta.url).map_err(|_| CacheError::InvalidUrl(meta.url.clone()))?;

        Ok(Some(Response { url, status: meta.status, content_type: meta.content_type, body }))
    }

    fn write_batch(&self, entries: &[(CacheKey, Response)]) -> Result<()> {
        let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(&self.dir)?;
        let incoming = staging.path().join("new");
        let displaced = staging.path().join("old");
        fs::create_dir(&incoming)?;
        fs::create_dir(&displaced)?;

        let mut files = Vec::with_capacity(entries.len() * 2);
        for (index, (key, response)) in entries.iter().enumerate() {
            let body_path = self.path_for(key);
            let meta = EntryMeta {
                key: key.clone(),
                url: response.url.to_string(),
                status: response.status,
                content_type: response.content_type.clone(),
            };

            let body_name = format!("{index}.{BODY_EXT}");
            let meta_name = format!("{index}.{META_EXT}");
            fs::write(incoming.join(&body_name), &response.body)?;
            fs::write(incoming.join(&meta_name), serde_json::to_vec_pretty(&meta)?)?;

            // Body before metadata, so readers never see metadata without a body.
            files.push(StagedFile {
                staged: incoming.join(&body_name),
                target: body_path.clone(),
                backup: displaced.join(&body_name),
            });
            files.push(StagedFile {
                staged: incoming.join(&meta_name),
                target: body_path.with_extension(META_EXT),
                backup: displaced.join(&meta_name),
            });
        }

        let mut committed: Vec<(&StagedFile, bool)> = Vec::with_capacity(files.len());
        for file in &files {
            match file.commit() {
                Ok(had_previous) => committed.push((file, had_previous)),
                Err(err) => {
                    for (file, had_previous) in committed.into_iter().rev() {
                        file.rollback(had_previous);
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(SEALED_MARKER)
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for shard_one in read_dirs(&self.dir)? {
            for shard_two in read_dirs(&shard_one)? {
                for entry in fs::read_dir(&shard_two)? {
                    let path = entry?.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXT) {
                        continue;
                    }
                    let meta: EntryMeta = serde_json::from_slice(&fs::read(&path)?)?;
                    keys.push(meta.key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl CacheRegion for DiskRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Response>> {
        let region = self.clone();
        let key = key.clone();
        blocking(move || region.read_entry(&key)).await
    }

    async fn put_all(&self, entries: Vec<(CacheKey, Response)>) -> Result<()> {
        let region = self.clone();
        blocking(move || region.write_batch(&entries)).await
    }

    async fn seal(&self) -> Result<()> {
        let marker = self.marker_path();
        blocking(move || fs::write(&marker, b"").map_err(CacheError::from)).await
    }

    async fn is_sealed(&self) -> Result<bool> {
        let marker = self.marker_path();
        blocking(move || Ok(marker.is_file())).await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let region = self.clone();
        blocking(move || region.list_keys()).await
    }
}

/// One file of a staged batch and where it goes.
#[derive(Debug)]
struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
    backup: PathBuf,
}

impl StagedFile {
    /// Move the staged file over its target, setting any previous file aside first.
    ///
    /// Returns whether a previous file was displaced.
    fn commit(&self) -> io::Result<bool> {
        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)?;
        }

        let displaced = match fs::symlink_metadata(&self.target) {
            Ok(meta) if meta.is_dir() => {
                return Err(io::Error::other(format!(
                    "cache entry path {} is a directory",
                    self.target.display()
                )));
            }
            Ok(_) => {
                fs::rename(&self.target, &self.backup)?;
                true
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(err),
        };

        if let Err(err) = fs::rename(&self.staged, &self.target) {
            if displaced {
                let _ = fs::rename(&self.backup, &self.target);
            }
            return Err(err);
        }
        Ok(displaced)
    }

    fn rollback(&self, displaced: bool) {
        let _ = fs::remove_file(&self.target);
        if displaced {
            let _ = fs::rename(&self.backup, &self.target);
        }
    }
}

/// Shard directories below `dir`. Dot-prefixed entries (staging) are skipped.
fn read_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_str().is_some_and(|name| name.starts_with('.'));
        if entry.file_type()?.is_dir() && !hidden {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| CacheError::Worker(err.to_string()))?
}
