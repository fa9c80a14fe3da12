//! Named Cache Abstractions
//!
//! Mirrors the host's named response-cache primitive: a set of independent
//! key → response stores, each identified by a name.
//!
//! Implementations must keep every named cache disjoint and must enumerate
//! keys in insertion order (oldest first). Writing an existing key replaces
//! the entry and moves it to the newest position, exactly like deleting and
//! re-inserting it.
//!
//! # Example
//!
//! ```ignore
//! use bridge_traits::cache_storage::CacheStorage;
//!
//! async fn oldest_key(storage: &dyn CacheStorage) -> Result<Option<String>> {
//!     let cache = storage.open("audio-cache").await?;
//!     Ok(cache.keys().await?.into_iter().next())
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::http::HttpResponse;

/// A single named cache.
#[async_trait]
pub trait NamedCache: Send + Sync {
    /// Name this cache was opened under.
    fn name(&self) -> &str;

    /// Look up a stored response without changing its position.
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>>;

    /// Store a response under `key`, becoming the newest entry.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::QuotaExceeded`](crate::error::BridgeError::QuotaExceeded)
    /// when the host refuses the write.
    async fn put(&self, key: &str, response: HttpResponse) -> Result<()>;

    /// Remove an entry. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Keys in insertion order, oldest first.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Move an existing entry to the newest position.
    ///
    /// Returns the entry when it was present. The default implementation is
    /// the delete-then-reinsert cycle; stores with an ordered index should
    /// override it.
    async fn touch(&self, key: &str) -> Result<Option<HttpResponse>> {
        let Some(response) = self.get(key).await? else {
            return Ok(None);
        };
        self.delete(key).await?;
        self.put(key, response.clone()).await?;
        Ok(Some(response))
    }

    /// Number of stored entries.
    async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    /// Body size of an entry in bytes, `None` when absent.
    ///
    /// The default reads the whole entry. Stores that record the size
    /// alongside the entry should answer from that record instead.
    async fn size_of(&self, key: &str) -> Result<Option<u64>> {
        Ok(self
            .get(key)
            .await?
            .map(|response| response.body.len() as u64))
    }
}

/// Registry of named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (creating if needed) the cache called `name`.
    async fn open(&self, name: &str) -> Result<Arc<dyn NamedCache>>;

    /// Whether a cache called `name` exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete a whole cache. Returns `true` if it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of every existing cache.
    async fn keys(&self) -> Result<Vec<String>>;
}
