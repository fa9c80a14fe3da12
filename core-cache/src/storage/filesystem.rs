//! Persistent named caches over [`FileSystemAccess`].
//!
//! ## Layout
//!
//! ```text
//! <cache dir>/named-caches/
//!   <hex(cache name)>/
//!     <sha256(key)>.body       raw response body
//!     <sha256(key)>.meta.json  key, status, headers, sequence, stored_at
//! ```
//!
//! Insertion order is a per-cache sequence number written into the metadata,
//! so `keys()` keeps its order across restarts. Every stored response carries
//! a `content-length` header matching the body it was written with; a body
//! file truncated afterwards is caught by the range slicer's integrity check.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{CacheStorage, Clock, FileSystemAccess, HttpResponse, NamedCache, SystemClock};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

const ROOT_DIR: &str = "named-caches";
const BODY_EXT: &str = "body";
const META_SUFFIX: &str = ".meta.json";

/// Metadata persisted next to every body file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: HashMap<String, String>,
    sequence: u64,
    stored_at: i64,
}

fn entry_stem(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn serialization_error(e: serde_json::Error) -> BridgeError {
    BridgeError::OperationFailed(format!("Cache metadata encoding failed: {}", e))
}

/// Ordered index of one cache directory.
#[derive(Default)]
struct Index {
    by_sequence: BTreeMap<u64, String>,
    by_key: HashMap<String, u64>,
    next_sequence: u64,
}

impl Index {
    fn insert(&mut self, key: &str) -> u64 {
        self.remove(key);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.by_sequence.insert(sequence, key.to_string());
        self.by_key.insert(key.to_string(), sequence);
        sequence
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.by_key.remove(key) {
            Some(sequence) => {
                self.by_sequence.remove(&sequence);
                true
            }
            None => false,
        }
    }
}

/// One named cache stored on disk.
pub struct FsCache {
    name: String,
    dir: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    index: Mutex<Index>,
}

impl FsCache {
    /// Opens `dir`, rebuilding the index from metadata files.
    async fn load(
        name: &str,
        dir: PathBuf,
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        fs.create_dir_all(&dir).await?;

        let mut index = Index::default();
        for path in fs.list_directory(&dir).await? {
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX));
            if !is_meta {
                continue;
            }

            let meta = match Self::read_meta_file(fs.as_ref(), &path).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(cache = %name, path = ?path, error = %e, "Skipping unreadable entry metadata");
                    continue;
                }
            };

            index.next_sequence = index.next_sequence.max(meta.sequence + 1);
            index.by_sequence.insert(meta.sequence, meta.key.clone());
            index.by_key.insert(meta.key, meta.sequence);
        }

        debug!(cache = %name, entries = index.by_key.len(), "Loaded persistent cache");

        Ok(Self {
            name: name.to_string(),
            dir,
            fs,
            clock,
            index: Mutex::new(index),
        })
    }

    async fn read_meta_file(fs: &dyn FileSystemAccess, path: &Path) -> Result<EntryMeta> {
        let raw = fs.read_file(path).await?;
        serde_json::from_slice(&raw).map_err(serialization_error)
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", entry_stem(key), BODY_EXT))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", entry_stem(key), META_SUFFIX))
    }

    async fn write_meta(&self, meta: &EntryMeta) -> Result<()> {
        let encoded = serde_json::to_vec(meta).map_err(serialization_error)?;
        self.fs
            .write_file(&self.meta_path(&meta.key), Bytes::from(encoded))
            .await
    }

    async fn remove_files(&self, key: &str) -> Result<()> {
        for path in [self.meta_path(key), self.body_path(key)] {
            match self.fs.delete_file(&path).await {
                Ok(()) | Err(BridgeError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NamedCache for FsCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<HttpResponse>> {
        if !self.index.lock().await.by_key.contains_key(key) {
            return Ok(None);
        }

        let meta = match Self::read_meta_file(self.fs.as_ref(), &self.meta_path(key)).await {
            Ok(meta) => meta,
            Err(BridgeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        // A missing body is returned empty; its content-length gives it away
        let body = match self.fs.read_file(&self.body_path(key)).await {
            Ok(body) => body,
            Err(BridgeError::NotFound(_)) => Bytes::new(),
            Err(e) => return Err(e),
        };

        Ok(Some(HttpResponse {
            status: meta.status,
            headers: meta.headers,
            body,
        }))
    }

    async fn put(&self, key: &str, response: HttpResponse) -> Result<()> {
        let mut headers = response.headers;
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-length"));
        headers.insert("content-length".to_string(), response.body.len().to_string());

        let mut index = self.index.lock().await;

        self.fs.write_file(&self.body_path(key), response.body).await?;

        let sequence = index.insert(key);
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers,
            sequence,
            stored_at: self.clock.unix_timestamp_millis(),
        };

        if let Err(e) = self.write_meta(&meta).await {
            index.remove(key);
            let _ = self.remove_files(key).await;
            return Err(e);
        }

        debug!(cache = %self.name, key = %key, sequence, "Persisted entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut index = self.index.lock().await;
        if !index.remove(key) {
            return Ok(false);
        }
        self.remove_files(key).await?;
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .index
            .lock()
            .await
            .by_sequence
            .values()
            .cloned()
            .collect())
    }

    /// Rewrites only the metadata; the body file is left in place.
    async fn touch(&self, key: &str) -> Result<Option<HttpResponse>> {
        let Some(response) = self.get(key).await? else {
            return Ok(None);
        };

        let mut index = self.index.lock().await;
        let mut meta = Self::read_meta_file(self.fs.as_ref(), &self.meta_path(key)).await?;
        meta.sequence = index.insert(key);
        self.write_meta(&meta).await?;

        Ok(Some(response))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.lock().await.by_key.len())
    }

    /// Answers from the recorded `content-length`; the body file is not read.
    async fn size_of(&self, key: &str) -> Result<Option<u64>> {
        if !self.index.lock().await.by_key.contains_key(key) {
            return Ok(None);
        }

        let meta = match Self::read_meta_file(self.fs.as_ref(), &self.meta_path(key)).await {
            Ok(meta) => meta,
            Err(BridgeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let recorded = meta
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<u64>().ok());
        match recorded {
            Some(size) => Ok(Some(size)),
            None => Ok(self.get(key).await?.map(|r| r.body.len() as u64)),
        }
    }
}

/// Registry of persistent caches rooted in the host cache directory.
pub struct FsCacheStorage {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    open: RwLock<HashMap<String, Arc<FsCache>>>,
}

impl FsCacheStorage {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            fs,
            clock: Arc::new(SystemClock),
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Use `clock` for entry timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn root(&self) -> Result<PathBuf> {
        Ok(self.fs.get_cache_directory().await?.join(ROOT_DIR))
    }

    async fn cache_dir(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root().await?.join(hex::encode(name.as_bytes())))
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>> {
        if let Some(cache) = self.open.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut open = self.open.write().await;
        if let Some(cache) = open.get(name) {
            return Ok(cache.clone());
        }

        let dir = self.cache_dir(name).await?;
        let cache = Arc::new(FsCache::load(name, dir, self.fs.clone(), self.clock.clone()).await?);
        open.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        if self.open.read().await.contains_key(name) {
            return Ok(true);
        }
        self.fs.exists(&self.cache_dir(name).await?).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut open = self.open.write().await;
        open.remove(name);

        let dir = self.cache_dir(name).await?;
        if !self.fs.exists(&dir).await? {
            return Ok(false);
        }
        self.fs.delete_dir_all(&dir).await?;
        debug!(cache = %name, "Deleted persistent cache");
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let root = self.root().await?;
        if !self.fs.exists(&root).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for path in self.fs.list_directory(&root).await? {
            let decoded = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| hex::decode(n).ok())
                .and_then(|raw| String::from_utf8(raw).ok());
            match decoded {
                Some(name) => names.push(name),
                None => warn!(path = ?path, "Ignoring foreign directory in cache root"),
            }
        }
        names.sort();
        Ok(names)
    }
}
