//! # Cache Layer
//!
//! The request-interception context: owns the router, the strategy
//! executors, the audio cache and the preloader for one deployment version.
//!
//! ## Lifecycle
//!
//! 1. [`CacheLayer::from_config`] builds the layer (no I/O).
//! 2. [`install`](CacheLayer::install) precaches the shell.
//! 3. [`activate`](CacheLayer::activate) deletes caches of older versions.
//! 4. [`handle`](CacheLayer::handle) answers intercepted requests.
//! 5. [`shutdown`](CacheLayer::shutdown) stops background work.
//!
//! ## Usage
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .version("2024-06-01.3")
//!     .origin("https://music.example")
//!     .build()?;
//! let layer = CacheLayer::from_config(config)?;
//!
//! layer.install().await;
//! layer.activate().await?;
//!
//! let response = layer
//!     .handle(HttpRequest::get("https://music.example/play/song.m4a").header("Range", "bytes=0-"))
//!     .await;
//! ```

use crate::audio::{usage_of, LruAudioCache};
use crate::control::{CommandOutcome, ControlCommand};
use crate::error::Result;
use crate::preload::{PreloadStatus, Preloader};
use crate::router::{Router, Strategy};
use crate::stats::{CacheStats, NamedCacheStats};
use crate::storage::{FsCacheStorage, MemoryCacheStorage};
use crate::strategy::{
    CacheFirst, FetchStrategy, NetworkFirst, NetworkOnly, StaleWhileRevalidate, StrategyContext,
};
use crate::version::{CacheNames, VersionManager};
use bridge_traits::{CacheStorage, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LifecycleEvent};
use core_runtime::logging::strip_query;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of [`CacheLayer::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub version: String,
    /// Shell URLs now cached
    pub precached: Vec<String>,
    /// Shell URLs that could not be fetched or stored
    pub failed: Vec<String>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Request-interception cache layer.
pub struct CacheLayer {
    config: CoreConfig,
    storage: Arc<dyn CacheStorage>,
    event_bus: EventBus,
    ctx: StrategyContext,
    router: Router,
    audio: Arc<LruAudioCache>,
    preloader: Preloader,
    versions: VersionManager,
    shell_fallback_key: String,
}

impl CacheLayer {
    /// Build a layer over an explicit storage.
    pub fn new(config: CoreConfig, storage: Arc<dyn CacheStorage>) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        Self::assemble(config, storage, event_bus)
    }

    /// Build a layer, choosing storage from the config.
    ///
    /// Precedence: injected `cache_storage`, then a persistent store over
    /// `file_system`, then an in-memory store.
    pub fn from_config(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn CacheStorage> = match (&config.cache_storage, &config.file_system) {
            (Some(storage), _) => storage.clone(),
            (None, Some(fs)) => Arc::new(FsCacheStorage::new(fs.clone())),
            (None, None) => {
                let memory = MemoryCacheStorage::new();
                Arc::new(match config.storage_quota_bytes {
                    Some(quota) => memory.with_quota_bytes(quota),
                    None => memory,
                })
            }
        };

        Ok(Self::new(config, storage))
    }

    /// Publish events on `event_bus` instead of the layer's own bus.
    pub fn with_event_bus(self, event_bus: EventBus) -> Self {
        Self::assemble(self.config, self.storage, event_bus)
    }

    fn assemble(config: CoreConfig, storage: Arc<dyn CacheStorage>, event_bus: EventBus) -> Self {
        let names = CacheNames::new(config.version.clone());
        let ctx = StrategyContext::new(config.http_client.clone(), storage.clone())
            .with_event_bus(event_bus.clone());
        let audio = Arc::new(LruAudioCache::new(
            ctx.clone(),
            names.audio(),
            config.max_audio_entries,
        ));
        let preloader = Preloader::new(audio.clone()).with_event_bus(event_bus.clone());
        let versions =
            VersionManager::new(storage.clone(), names.clone()).with_event_bus(event_bus.clone());
        let shell_fallback_key = match &config.origin {
            Some(origin) => format!("{}{}", origin, config.shell_fallback_path),
            None => config.shell_fallback_path.clone(),
        };
        let router = Router::new(config.routes.clone(), names);

        Self {
            config,
            storage,
            event_bus,
            ctx,
            router,
            audio,
            preloader,
            versions,
            shell_fallback_key,
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn names(&self) -> &CacheNames {
        self.router.names()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn audio(&self) -> &LruAudioCache {
        &self.audio
    }

    /// Open the current caches and precache the shell. Best effort.
    #[instrument(skip(self), fields(version = %self.config.version))]
    pub async fn install(&self) -> InstallReport {
        let names = self.router.names();
        for name in names.current() {
            if let Err(e) = self.storage.open(name).await {
                warn!(cache = %name, error = %e, "Failed to open cache");
            }
        }

        let mut report = InstallReport {
            version: self.config.version.clone(),
            ..InstallReport::default()
        };

        let origin = self.config.origin.as_deref().unwrap_or_default();
        let fetches = self.config.precache_paths.iter().map(|path| {
            let url = format!("{}{}", origin, path);
            async move {
                let cached = self.precache(names.shell(), &url).await;
                (url, cached)
            }
        });

        for (url, cached) in join_all(fetches).await {
            if cached {
                report.precached.push(url);
            } else {
                report.failed.push(url);
            }
        }

        info!(
            precached = report.precached.len(),
            failed = report.failed.len(),
            "Install finished"
        );
        let _ = self
            .event_bus
            .emit(CoreEvent::Lifecycle(LifecycleEvent::Installed {
                version: report.version.clone(),
                precached: report.precached.len(),
                failed: report.failed.len(),
            }));

        report
    }

    async fn precache(&self, cache_name: &str, url: &str) -> bool {
        match self.ctx.fetch(HttpRequest::get(url)).await {
            Ok(response) if response.is_success() => self
                .ctx
                .store(cache_name, url, response)
                .await
                .map_err(|e| warn!(url = %url, error = %e, "Failed to store shell asset"))
                .is_ok(),
            Ok(response) => {
                warn!(url = %url, status = response.status, "Shell asset not precached");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Shell asset not precached");
                false
            }
        }
    }

    /// Delete caches of other versions. The audio cache is kept.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let deleted = self.versions.activate().await?;

        info!(version = %self.config.version, deleted = deleted.len(), "Activated");
        let _ = self
            .event_bus
            .emit(CoreEvent::Lifecycle(LifecycleEvent::Activated {
                version: self.config.version.clone(),
                deleted_caches: deleted.clone(),
            }));

        Ok(deleted)
    }

    /// Answer an intercepted request. Never fails.
    #[instrument(skip_all, fields(method = %request.method, url = %strip_query(&request.url)))]
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let decision = self.router.route(&request);
        let names = self.router.names();
        debug!(class = ?decision.class, strategy = ?decision.strategy, "Routed request");

        match decision.strategy {
            Strategy::AudioLru => self.audio.handle(request).await,
            Strategy::CacheFirst => {
                CacheFirst::new(self.ctx.clone(), names.shell(), self.shell_fallback_key.clone())
                    .respond(request)
                    .await
            }
            Strategy::NetworkFirst { timeout } => {
                NetworkFirst::new(self.ctx.clone(), names.api(), timeout)
                    .respond(request)
                    .await
            }
            Strategy::StaleWhileRevalidate => {
                StaleWhileRevalidate::new(self.ctx.clone(), names.thumbnails())
                    .respond(request)
                    .await
            }
            Strategy::NetworkOnly => {
                NetworkOnly::new(self.ctx.clone(), decision.class)
                    .respond(request)
                    .await
            }
        }
    }

    /// Run an out-of-band command.
    #[instrument(skip(self))]
    pub async fn handle_command(&self, command: ControlCommand) -> Result<CommandOutcome> {
        match command {
            ControlCommand::ClearAudioCache => {
                self.preloader.cancel().await;
                let removed = self.audio.clear().await?;
                Ok(CommandOutcome::AudioCacheCleared { removed })
            }
            ControlCommand::PreloadAudio { url } => {
                let key = LruAudioCache::key_for(&url);
                Ok(match self.preloader.preload(&url).await {
                    PreloadStatus::Started => CommandOutcome::PreloadStarted { key },
                    PreloadStatus::AlreadyCached => CommandOutcome::AlreadyCached { key },
                })
            }
            ControlCommand::CancelPreload => Ok(CommandOutcome::PreloadCancelled {
                was_running: self.preloader.cancel().await,
            }),
        }
    }

    /// Parse and run a JSON control message.
    pub async fn handle_message(&self, message: &str) -> Result<CommandOutcome> {
        self.handle_command(ControlCommand::from_json(message)?).await
    }

    /// Key of the running preload, if any.
    pub async fn preload_in_flight(&self) -> Option<String> {
        self.preloader.in_flight().await
    }

    /// Entry counts and sizes of the current caches.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut caches = Vec::new();
        for name in self.router.names().current() {
            if !self.storage.has(name).await? {
                continue;
            }
            let (entries, total_bytes) = usage_of(self.storage.open(name).await?).await?;
            caches.push(NamedCacheStats {
                name: name.to_string(),
                entries,
                total_bytes,
            });
        }

        Ok(CacheStats {
            version: self.config.version.clone(),
            caches,
            max_audio_entries: self.audio.max_entries(),
            calculated_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Stop background work.
    pub async fn shutdown(&self) {
        if self.preloader.cancel().await {
            info!("Cancelled preload on shutdown");
        }
    }
}
