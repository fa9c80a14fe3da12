//! # Strategy Executors
//!
//! Interchangeable fetch strategies run against one named cache.
//!
//! ## Overview
//!
//! - [`CacheFirst`]: cached entry if present, else network (successful
//!   answers are stored). Offline navigations fall back to the shell entry.
//! - [`NetworkFirst`]: races the network against a timer. The fetch is never
//!   cancelled; when the timer wins it keeps running and refreshes the cache
//!   for next time.
//! - [`StaleWhileRevalidate`]: answers from cache immediately and always
//!   refreshes in the background.
//! - [`NetworkOnly`]: no cache involvement at all.
//!
//! Every strategy returns a response. Network failures become cached
//! fallbacks or synthetic 503s, and cache write failures are logged and
//! dropped.

use crate::error::{CacheError, Result};
use crate::responses::{offline_json, offline_text, OFFLINE_MESSAGE};
use crate::router::{is_navigation, ResourceClass};
use async_trait::async_trait;
use bridge_traits::{CacheStorage, HttpClient, HttpRequest, HttpResponse, NamedCache};
use core_runtime::events::{CacheEvent, EventBus};
use core_runtime::logging::strip_query;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Cache key for non-audio resources: the URL minus any fragment.
pub fn cache_key(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}

/// Shared handles every strategy needs.
#[derive(Clone)]
pub struct StrategyContext {
    http_client: Arc<dyn HttpClient>,
    storage: Arc<dyn CacheStorage>,
    event_bus: Option<EventBus>,
}

impl StrategyContext {
    pub fn new(http_client: Arc<dyn HttpClient>, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            http_client,
            storage,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn http_client(&self) -> &Arc<dyn HttpClient> {
        &self.http_client
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_cache(event);
        }
    }

    /// Real network fetch.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = strip_query(&request.url).to_string();
        self.http_client.execute(request).await.map_err(|e| {
            debug!(url = %url, error = %e, "Network fetch failed");
            CacheError::Network(e.to_string())
        })
    }

    pub async fn open(&self, cache_name: &str) -> Result<Arc<dyn NamedCache>> {
        Ok(self.storage.open(cache_name).await?)
    }

    /// Cache lookup where a storage failure counts as a miss.
    pub async fn lookup(&self, cache_name: &str, key: &str) -> Option<HttpResponse> {
        let cache = match self.open(cache_name).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(cache = %cache_name, error = %e, "Cache unavailable, treating as miss");
                return None;
            }
        };

        match cache.get(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(cache = %cache_name, key = %strip_query(key), error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Writes `response` under `key`.
    pub async fn store(&self, cache_name: &str, key: &str, response: HttpResponse) -> Result<()> {
        let cache = self.open(cache_name).await?;
        cache
            .put(key, response)
            .await
            .map_err(|e| CacheError::write_failed(key, e))
    }

    /// [`store`](Self::store), logging and discarding any failure.
    pub async fn store_best_effort(&self, cache_name: &str, key: &str, response: HttpResponse) -> bool {
        match self.store(cache_name, key, response).await {
            Ok(()) => true,
            Err(e) => {
                warn!(cache = %cache_name, key = %strip_query(key), error = %e, "Cache write failed, serving network response");
                self.emit(CacheEvent::WriteFailed {
                    cache_name: cache_name.to_string(),
                    key: strip_query(key).to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }
}

/// A policy for answering one request from cache, network or both.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Produce a response; never fails.
    async fn respond(&self, request: HttpRequest) -> HttpResponse;
}

// ============================================================================
// Cache-First
// ============================================================================

pub struct CacheFirst {
    ctx: StrategyContext,
    cache_name: String,
    /// Key served to offline navigations
    shell_fallback_key: String,
}

impl CacheFirst {
    pub fn new(
        ctx: StrategyContext,
        cache_name: impl Into<String>,
        shell_fallback_key: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            cache_name: cache_name.into(),
            shell_fallback_key: shell_fallback_key.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for CacheFirst {
    #[instrument(skip_all, fields(cache = %self.cache_name))]
    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        let key = cache_key(&request.url);

        if let Some(cached) = self.ctx.lookup(&self.cache_name, &key).await {
            debug!(key = %strip_query(&key), "Cache hit");
            return cached;
        }

        let navigation = is_navigation(&request);
        match self.ctx.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.ctx
                        .store_best_effort(&self.cache_name, &key, response.clone())
                        .await;
                }
                response
            }
            Err(_) if navigation => {
                match self
                    .ctx
                    .lookup(&self.cache_name, &self.shell_fallback_key)
                    .await
                {
                    Some(shell) => {
                        debug!(key = %strip_query(&key), "Offline navigation, serving shell");
                        shell
                    }
                    None => offline_text(OFFLINE_MESSAGE),
                }
            }
            Err(_) => offline_text(OFFLINE_MESSAGE),
        }
    }
}

// ============================================================================
// Network-First
// ============================================================================

pub struct NetworkFirst {
    ctx: StrategyContext,
    cache_name: String,
    timeout: Duration,
}

impl NetworkFirst {
    pub fn new(ctx: StrategyContext, cache_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ctx,
            cache_name: cache_name.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FetchStrategy for NetworkFirst {
    #[instrument(skip_all, fields(cache = %self.cache_name, timeout_ms = self.timeout.as_millis() as u64))]
    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        let key = cache_key(&request.url);

        // The fetch runs on its own task so losing the race does not cancel it
        let mut fetch = {
            let ctx = self.ctx.clone();
            let cache_name = self.cache_name.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let response = ctx.fetch(request).await?;
                if response.is_success() {
                    ctx.store_best_effort(&cache_name, &key, response.clone())
                        .await;
                }
                Ok::<_, CacheError>(response)
            })
        };

        let failure = match tokio::time::timeout(self.timeout, &mut fetch).await {
            Ok(Ok(Ok(response))) => return response,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(join_error)) => join_error.to_string(),
            Err(_) => {
                debug!(key = %strip_query(&key), "Network timed out, fetch continues in background");
                "Network timeout".to_string()
            }
        };

        match self.ctx.lookup(&self.cache_name, &key).await {
            Some(cached) => cached,
            None => {
                warn!(key = %strip_query(&key), reason = %failure, "No cached fallback");
                offline_json("Network unavailable and no cached data")
            }
        }
    }
}

// ============================================================================
// Stale-While-Revalidate
// ============================================================================

pub struct StaleWhileRevalidate {
    ctx: StrategyContext,
    cache_name: String,
}

impl StaleWhileRevalidate {
    pub fn new(ctx: StrategyContext, cache_name: impl Into<String>) -> Self {
        Self {
            ctx,
            cache_name: cache_name.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for StaleWhileRevalidate {
    #[instrument(skip_all, fields(cache = %self.cache_name))]
    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        let key = cache_key(&request.url);
        let cached = self.ctx.lookup(&self.cache_name, &key).await;

        let revalidation = {
            let ctx = self.ctx.clone();
            let cache_name = self.cache_name.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let response = ctx.fetch(request).await?;
                if response.is_success() {
                    ctx.store_best_effort(&cache_name, &key, response.clone())
                        .await;
                }
                Ok::<_, CacheError>(response)
            })
        };

        if let Some(cached) = cached {
            debug!(key = %strip_query(&key), "Serving stale entry, revalidating");
            return cached;
        }

        match revalidation.await {
            Ok(Ok(response)) => response,
            _ => offline_json("Network unavailable and no cached data"),
        }
    }
}

// ============================================================================
// Network-Only
// ============================================================================

pub struct NetworkOnly {
    ctx: StrategyContext,
    class: ResourceClass,
}

impl NetworkOnly {
    pub fn new(ctx: StrategyContext, class: ResourceClass) -> Self {
        Self { ctx, class }
    }
}

#[async_trait]
impl FetchStrategy for NetworkOnly {
    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        match self.ctx.fetch(request).await {
            Ok(response) => response,
            Err(_) => match self.class {
                ResourceClass::Shell => offline_text(OFFLINE_MESSAGE),
                _ => offline_json("Network unavailable"),
            },
        }
    }
}
