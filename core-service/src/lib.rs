//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, cache
//! storage, filesystem) into a [`CacheLayer`] and drives its lifecycle.
//! Desktop apps typically enable the `desktop-shims` feature (which depends
//! on `bridge-desktop`) and call [`bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_cache::{CacheLayer, CacheStats, CommandOutcome, ControlCommand, InstallReport};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventStream};

use bridge_traits::{CacheStorage, FileSystemAccess, HttpClient, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::info;

/// Aggregated handle to the bridge dependencies the core requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    /// Host cache store; takes precedence over `file_system`
    pub cache_storage: Option<Arc<dyn CacheStorage>>,
    /// Backs a persistent store when no `cache_storage` is given
    pub file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreDependencies {
    /// Dependencies with in-memory caches only.
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            cache_storage: None,
            file_system: None,
        }
    }

    pub fn with_cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.cache_storage = Some(storage);
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Reqwest HTTP client and tokio filesystem.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop() -> Result<Self> {
        let http_client = bridge_desktop::ReqwestHttpClient::new()?;

        Ok(Self::new(Arc::new(http_client))
            .with_file_system(Arc::new(bridge_desktop::TokioFileSystem::new())))
    }

    fn apply(self, builder: CoreConfigBuilder) -> CoreConfigBuilder {
        let builder = builder.http_client(self.http_client);
        let builder = match self.cache_storage {
            Some(storage) => builder.cache_storage(storage),
            None => builder,
        };
        match self.file_system {
            Some(fs) => builder.file_system(fs),
            None => builder,
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    layer: Arc<CacheLayer>,
}

impl CoreService {
    /// Create a service from a finished config. Performs no I/O.
    pub fn new(config: CoreConfig) -> Result<Self> {
        Ok(Self {
            layer: Arc::new(CacheLayer::from_config(config)?),
        })
    }

    /// Create a service, injecting `deps` into `builder`.
    pub fn with_dependencies(builder: CoreConfigBuilder, deps: CoreDependencies) -> Result<Self> {
        Self::new(deps.apply(builder).build()?)
    }

    pub fn layer(&self) -> &CacheLayer {
        &self.layer
    }

    /// Install then activate the current version.
    ///
    /// A partial install is not an error; the report lists what failed.
    pub async fn start(&self) -> Result<InstallReport> {
        let report = self.layer.install().await;
        let deleted = self.layer.activate().await?;
        info!(
            version = %self.layer.version(),
            precached = report.precached.len(),
            deleted_caches = deleted.len(),
            "Cache layer started"
        );
        Ok(report)
    }

    /// Answer an intercepted request.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.layer.handle(request).await
    }

    /// Run a JSON control message.
    pub async fn handle_message(&self, message: &str) -> Result<CommandOutcome> {
        Ok(self.layer.handle_message(message).await?)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        Ok(self.layer.stats().await?)
    }

    /// Stream of cache and lifecycle events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.layer.event_bus().subscribe())
    }

    pub async fn shutdown(&self) {
        self.layer.shutdown().await;
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop("2024-06-01.3", "https://music.example").await?;
/// let stats = core.stats().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(version: &str, origin: &str) -> Result<CoreService> {
    let deps = CoreDependencies::desktop()?;
    let builder = CoreConfig::builder().version(version).origin(origin);
    let service = CoreService::with_dependencies(builder, deps)?;
    service.start().await?;
    Ok(service)
}
