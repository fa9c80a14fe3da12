//! # LRU Audio Cache
//!
//! Bounded cache of full audio objects, serving byte ranges for seeking.
//!
//! ## Overview
//!
//! Entries are keyed by the request path without its query string, so
//! cache-busting parameters all hit the same track. The store's insertion
//! order is the recency order:
//!
//! - a hit without `Range` touches the entry (moves it to newest)
//! - a hit with `Range` is sliced from the stored body; a corrupt entry is
//!   evicted and refetched
//! - a miss goes to the network unchanged; only full `200` answers to
//!   requests without `Range` are stored, after which the oldest entries
//!   beyond the capacity are deleted
//!
//! Storage failures never fail playback: the network response is served and
//! the failure is logged.

use crate::error::{CacheError, Result};
use crate::range;
use crate::responses::{offline_text, AUDIO_OFFLINE_MESSAGE};
use crate::router::request_path;
use crate::strategy::StrategyContext;
use bridge_traits::{HttpMethod, HttpRequest, HttpResponse, NamedCache};
use core_runtime::events::CacheEvent;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Audio cache bounded to `max_entries` objects.
pub struct LruAudioCache {
    ctx: StrategyContext,
    cache_name: String,
    max_entries: usize,
}

impl LruAudioCache {
    pub fn new(ctx: StrategyContext, cache_name: impl Into<String>, max_entries: usize) -> Self {
        Self {
            ctx,
            cache_name: cache_name.into(),
            max_entries: max_entries.max(1),
        }
    }

    /// Cache key for an audio URL.
    pub fn key_for(url: &str) -> String {
        request_path(url)
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Serve an audio request. Never fails.
    #[instrument(skip_all, fields(key = %Self::key_for(&request.url)))]
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        if request.method != HttpMethod::Get {
            return self.network_only(request).await;
        }

        let key = Self::key_for(&request.url);
        let cache = match self.ctx.open(&self.cache_name).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Audio cache unavailable");
                return self.network_only(request).await;
            }
        };

        if let Some(response) = self.serve_cached(cache.as_ref(), &key, &request).await {
            return response;
        }

        match self.fetch_and_store(request).await {
            Ok((response, _)) => response,
            Err(e) => {
                debug!(error = %e, "Audio fetch failed with no cached copy");
                offline_text(AUDIO_OFFLINE_MESSAGE)
            }
        }
    }

    /// Answer from the store, or `None` to fall through to the network.
    async fn serve_cached(
        &self,
        cache: &dyn NamedCache,
        key: &str,
        request: &HttpRequest,
    ) -> Option<HttpResponse> {
        let stored = match cache.get(key).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(error = %e, "Audio cache read failed");
                return None;
            }
        };

        let served = match request.range() {
            Some(range_header) => range::slice(key, &stored, range_header),
            None => range::verify_integrity(key, &stored).map(|()| stored),
        };

        match served {
            Ok(response) if request.range().is_some() => {
                debug!(status = response.status, "Served range from cache");
                Some(response)
            }
            Ok(response) => match cache.touch(key).await {
                Ok(touched) => {
                    debug!("Served full object from cache");
                    Some(touched.unwrap_or(response))
                }
                Err(e) => {
                    warn!(error = %e, "Failed to refresh entry recency");
                    Some(response)
                }
            },
            Err(e) => {
                warn!(error = %e, "Evicting corrupt audio entry");
                if let Err(e) = cache.delete(key).await {
                    warn!(error = %e, "Failed to evict corrupt entry");
                }
                self.ctx.emit(CacheEvent::CorruptEntryEvicted {
                    cache_name: self.cache_name.clone(),
                    key: key.to_string(),
                });
                None
            }
        }
    }

    async fn network_only(&self, request: HttpRequest) -> HttpResponse {
        self.ctx
            .fetch(request)
            .await
            .unwrap_or_else(|_| offline_text(AUDIO_OFFLINE_MESSAGE))
    }

    /// Fetch `request` and store the answer when it is a full object.
    ///
    /// Returns the network response and whether it was stored.
    pub async fn fetch_and_store(&self, request: HttpRequest) -> Result<(HttpResponse, bool)> {
        let key = Self::key_for(&request.url);
        let partial = request.range().is_some();
        let response = self.fetch(request).await?;

        let stored = !partial && self.store(&key, &response).await;
        Ok((response, stored))
    }

    /// Network fetch only; nothing is written.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.ctx.fetch(request).await
    }

    /// Store a full `200` answer under `key`, then trim to capacity.
    ///
    /// Returns whether the entry was written. Write failures are logged and
    /// swallowed.
    pub async fn store(&self, key: &str, response: &HttpResponse) -> bool {
        if response.status != 200 {
            return false;
        }

        let size_bytes = response.body.len() as u64;
        let stored = self
            .ctx
            .store_best_effort(&self.cache_name, key, response.clone())
            .await;

        if stored {
            debug!(key = %key, size_bytes, "Stored audio object");
            self.ctx.emit(CacheEvent::AudioEntryStored {
                key: key.to_string(),
                size_bytes,
            });

            if let Err(e) = self.trim().await {
                warn!(error = %e, "Audio cache trim failed");
            }
        }

        stored
    }

    /// Whether a full object for `url` is stored.
    pub async fn contains(&self, url: &str) -> bool {
        self.ctx
            .lookup(&self.cache_name, &Self::key_for(url))
            .await
            .is_some()
    }

    /// Delete the oldest entries beyond capacity. Returns the evicted keys.
    pub async fn trim(&self) -> Result<Vec<String>> {
        let cache = self.ctx.open(&self.cache_name).await?;
        let keys = cache.keys().await?;

        if keys.len() <= self.max_entries {
            return Ok(Vec::new());
        }

        let excess = keys.len() - self.max_entries;
        let mut evicted = Vec::with_capacity(excess);
        for key in keys.into_iter().take(excess) {
            // A concurrent touch may already have removed it
            if cache.delete(&key).await? {
                evicted.push(key);
            }
        }

        if !evicted.is_empty() {
            info!(count = evicted.len(), max = self.max_entries, "Evicted oldest audio entries");
            self.ctx.emit(CacheEvent::AudioEntriesEvicted {
                keys: evicted.clone(),
            });
        }

        Ok(evicted)
    }

    /// Remove every audio entry regardless of version. Returns how many were stored.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize> {
        let storage = self.ctx.storage();
        let removed = if storage.has(&self.cache_name).await? {
            storage.open(&self.cache_name).await?.len().await?
        } else {
            0
        };

        storage
            .delete(&self.cache_name)
            .await
            .map_err(CacheError::from)?;

        info!(removed, "Cleared audio cache");
        self.ctx.emit(CacheEvent::AudioCacheCleared { removed });
        Ok(removed)
    }

    /// Entry count and stored bytes.
    pub async fn usage(&self) -> Result<(usize, u64)> {
        usage_of(self.ctx.open(&self.cache_name).await?).await
    }
}

/// Entry count and stored body bytes of one cache.
pub(crate) async fn usage_of(cache: Arc<dyn NamedCache>) -> Result<(usize, u64)> {
    let keys = cache.keys().await?;
    let mut bytes = 0u64;
    for key in &keys {
        bytes += cache.size_of(key).await?.unwrap_or(0);
    }
    Ok((keys.len(), bytes))
}
