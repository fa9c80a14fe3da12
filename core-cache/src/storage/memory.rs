//! In-process named caches.
//!
//! Every cache is an unbounded [`LruCache`] used purely as an ordered index:
//! `put` and `touch` move an entry to the newest position while `get` peeks
//! without reordering. Capacity policy lives in the audio cache, not here.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{CacheStorage, HttpResponse, NamedCache};
use lru::LruCache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Bytes charged against the quota for one stored response.
fn entry_size(response: &HttpResponse) -> u64 {
    let headers: usize = response
        .headers
        .iter()
        .map(|(k, v)| k.len() + v.len())
        .sum();
    (response.body.len() + headers) as u64
}

/// Usage shared by every cache opened from one storage.
#[derive(Debug)]
struct Quota {
    limit: Option<u64>,
    used: std::sync::Mutex<u64>,
}

impl Quota {
    /// Reserves `added - released` bytes, failing when the limit would be exceeded.
    fn reserve(&self, released: u64, added: u64) -> Result<()> {
        let mut used = self
            .used
            .lock()
            .map_err(|_| BridgeError::OperationFailed("quota lock poisoned".to_string()))?;
        let next = used.saturating_sub(released) + added;

        if let Some(limit) = self.limit {
            if next > limit {
                return Err(BridgeError::QuotaExceeded(format!(
                    "{} bytes requested, {} allowed",
                    next, limit
                )));
            }
        }

        *used = next;
        Ok(())
    }

    fn release(&self, bytes: u64) {
        if let Ok(mut used) = self.used.lock() {
            *used = used.saturating_sub(bytes);
        }
    }

    fn used(&self) -> u64 {
        self.used.lock().map(|used| *used).unwrap_or(0)
    }
}

/// One in-memory named cache.
pub struct MemoryCache {
    name: String,
    entries: Mutex<LruCache<String, HttpResponse>>,
    quota: Arc<Quota>,
}

impl MemoryCache {
    fn new(name: &str, quota: Arc<Quota>) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(LruCache::unbounded()),
            quota,
        }
    }

    async fn total_bytes(&self) -> u64 {
        self.entries.lock().await.iter().map(|(_, r)| entry_size(r)).sum()
    }
}

#[async_trait]
impl NamedCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<HttpResponse>> {
        Ok(self.entries.lock().await.peek(key).cloned())
    }

    async fn put(&self, key: &str, response: HttpResponse) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let released = entries.peek(key).map(entry_size).unwrap_or(0);

        self.quota.reserve(released, entry_size(&response))?;
        entries.put(key.to_string(), response);

        debug!(cache = %self.name, key = %key, "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.entries.lock().await.pop(key);
        if let Some(response) = &removed {
            self.quota.release(entry_size(response));
        }
        Ok(removed.is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        // LruCache iterates newest first
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn touch(&self, key: &str) -> Result<Option<HttpResponse>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }

    async fn size_of(&self, key: &str) -> Result<Option<u64>> {
        Ok(self
            .entries
            .lock()
            .await
            .peek(key)
            .map(|response| response.body.len() as u64))
    }
}

/// Registry of in-memory caches.
///
/// # Example
///
/// ```ignore
/// let storage = MemoryCacheStorage::new().with_quota_bytes(50 * 1024 * 1024);
/// let audio = storage.open("audio-cache").await?;
/// ```
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
    quota: Arc<Quota>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            quota: Arc::new(Quota {
                limit: None,
                used: std::sync::Mutex::new(0),
            }),
        }
    }

    /// Refuse writes once all caches together would exceed `bytes`.
    pub fn with_quota_bytes(self, bytes: u64) -> Self {
        Self {
            quota: Arc::new(Quota {
                limit: Some(bytes),
                used: std::sync::Mutex::new(0),
            }),
            ..self
        }
    }

    /// Bytes currently charged against the quota.
    pub fn used_bytes(&self) -> u64 {
        self.quota.used()
    }
}

impl Default for MemoryCacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>> {
        if let Some(cache) = self.caches.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name, self.quota.clone())))
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.caches.write().await.remove(name);
        match removed {
            Some(cache) => {
                self.quota.release(cache.total_bytes().await);
                debug!(cache = %name, "Deleted cache");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static [u8]) -> HttpResponse {
        HttpResponse::new(200).with_body(body)
    }

    #[tokio::test]
    async fn test_keys_follow_insertion_order() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("shell-v1").await.unwrap();

        cache.put("/a", response(b"a")).await.unwrap();
        cache.put("/b", response(b"b")).await.unwrap();
        cache.put("/c", response(b"c")).await.unwrap();

        // Reads never reorder
        cache.get("/a").await.unwrap();
        assert_eq!(cache.keys().await.unwrap(), vec!["/a", "/b", "/c"]);

        // Re-put moves to newest
        cache.put("/a", response(b"a2")).await.unwrap();
        assert_eq!(cache.keys().await.unwrap(), vec!["/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn test_touch_moves_to_newest() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("audio-cache").await.unwrap();

        cache.put("/play/1", response(b"1")).await.unwrap();
        cache.put("/play/2", response(b"2")).await.unwrap();

        let touched = cache.touch("/play/1").await.unwrap();
        assert_eq!(touched.unwrap().body.as_ref(), b"1");
        assert_eq!(cache.keys().await.unwrap(), vec!["/play/2", "/play/1"]);

        assert!(cache.touch("/play/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_named_caches_are_disjoint() {
        let storage = MemoryCacheStorage::new();
        let v1 = storage.open("api-v1").await.unwrap();
        let v2 = storage.open("api-v2").await.unwrap();

        v1.put("/api/history", response(b"old")).await.unwrap();
        assert!(v2.get("/api/history").await.unwrap().is_none());

        assert!(storage.delete("api-v1").await.unwrap());
        assert!(!storage.has("api-v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["api-v2"]);
    }

    #[tokio::test]
    async fn test_quota_refuses_oversized_writes() {
        let storage = MemoryCacheStorage::new().with_quota_bytes(8);
        let cache = storage.open("audio-cache").await.unwrap();

        cache.put("/play/1", response(b"12345")).await.unwrap();
        let err = cache.put("/play/2", response(b"12345")).await.unwrap_err();
        assert!(matches!(err, BridgeError::QuotaExceeded(_)));

        // Freed space is reusable
        assert!(cache.delete("/play/1").await.unwrap());
        cache.put("/play/2", response(b"12345")).await.unwrap();
        assert_eq!(storage.used_bytes(), 5);
    }
}
