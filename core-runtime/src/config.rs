//! # Core Configuration Module
//!
//! Provides configuration management for the request-interception cache layer.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the deployment version, the routing table, capacity
//! limits and the bridges the layer talks to. It enforces fail-fast
//! validation so a misconfigured layer never starts intercepting requests.
//!
//! ## Required Settings
//!
//! - `version` - the deployment's version tag; caches tagged with any other
//!   version are garbage-collected on activation
//! - `HttpClient` - the real network fetch (desktop default: reqwest)
//!
//! ## Optional Settings
//!
//! - `CacheStorage` - named cache primitive (default: in-memory)
//! - `FileSystemAccess` - when present and no `CacheStorage` is injected, the
//!   layer persists caches on disk (desktop default: tokio fs)
//! - `origin` - base URL for precaching shell assets
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .version("2024-06-01.3")
//!     .origin("https://music.example")
//!     .max_audio_entries(40)
//!     .endpoint_timeout("/api/history", Duration::from_secs(15))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{CacheStorage, FileSystemAccess, HttpClient};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on the number of cached audio objects.
pub const DEFAULT_MAX_AUDIO_ENTRIES: usize = 40;

/// Default race timeout for network-first API reads.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for endpoints known to respond slowly.
pub const HEAVY_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(15);

/// A longer network-first timeout for one family of API endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTimeout {
    /// Path prefix, e.g. `/api/history`
    pub prefix: String,
    pub timeout: Duration,
}

impl EndpointTimeout {
    pub fn new(prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            timeout,
        }
    }
}

/// Path prefixes used to classify intercepted requests.
///
/// Defaults mirror the origin server's route layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Audio streams (`/play/<file>`)
    pub audio_prefix: String,
    /// Thumbnail images (`/api/thumbnails/<file>`)
    pub thumbnail_prefix: String,
    /// Auth endpoints; never cached, never raced
    pub auth_prefix: String,
    /// Every other JSON API
    pub api_prefix: String,
    /// Network-first timeout for API reads without a specific override
    pub api_timeout: Duration,
    /// Per-endpoint overrides, longest matching prefix wins
    pub endpoint_timeouts: Vec<EndpointTimeout>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            audio_prefix: "/play/".to_string(),
            thumbnail_prefix: "/api/thumbnails/".to_string(),
            auth_prefix: "/api/auth/".to_string(),
            api_prefix: "/api/".to_string(),
            api_timeout: DEFAULT_API_TIMEOUT,
            endpoint_timeouts: vec![
                EndpointTimeout::new("/api/history", HEAVY_ENDPOINT_TIMEOUT),
                EndpointTimeout::new("/api/status/", HEAVY_ENDPOINT_TIMEOUT),
                EndpointTimeout::new("/api/playlist-download/status/", HEAVY_ENDPOINT_TIMEOUT),
                EndpointTimeout::new("/api/spotify-import/status/", HEAVY_ENDPOINT_TIMEOUT),
            ],
        }
    }
}

impl RouteConfig {
    /// Network-first timeout for an API path.
    pub fn timeout_for(&self, path: &str) -> Duration {
        self.endpoint_timeouts
            .iter()
            .filter(|endpoint| path.starts_with(&endpoint.prefix))
            .max_by_key(|endpoint| endpoint.prefix.len())
            .map(|endpoint| endpoint.timeout)
            .unwrap_or(self.api_timeout)
    }

    /// Checks every prefix is an absolute path and every timeout is non-zero.
    pub fn validate(&self) -> Result<()> {
        let prefixes = [
            ("audio_prefix", &self.audio_prefix),
            ("thumbnail_prefix", &self.thumbnail_prefix),
            ("auth_prefix", &self.auth_prefix),
            ("api_prefix", &self.api_prefix),
        ];

        for (name, value) in prefixes {
            if !value.starts_with('/') {
                return Err(Error::InvalidPrefix {
                    name: name.to_string(),
                    value: value.clone(),
                });
            }
        }

        for endpoint in &self.endpoint_timeouts {
            if !endpoint.prefix.starts_with('/') {
                return Err(Error::InvalidPrefix {
                    name: "endpoint_timeouts".to_string(),
                    value: endpoint.prefix.clone(),
                });
            }
            if endpoint.timeout.is_zero() {
                return Err(Error::Config(format!(
                    "Timeout for {} must be greater than zero",
                    endpoint.prefix
                )));
            }
        }

        if self.api_timeout.is_zero() {
            return Err(Error::Config(
                "api_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the cache layer.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Deployment version tag
    pub version: String,

    /// Origin base URL (scheme + host) used to resolve precache paths
    pub origin: Option<String>,

    /// Upper bound on cached audio objects
    pub max_audio_entries: usize,

    /// Request classification table
    pub routes: RouteConfig,

    /// Shell assets fetched into the shell cache on install
    pub precache_paths: Vec<String>,

    /// Cache key served to navigation requests when offline
    pub shell_fallback_path: String,

    /// Buffer size of the cache event bus
    pub event_buffer_size: usize,

    /// Byte quota for the default in-memory store (`None` = unbounded)
    pub storage_quota_bytes: Option<u64>,

    /// Real network fetch
    pub http_client: Arc<dyn HttpClient>,

    /// Named cache primitive (optional; see module docs)
    pub cache_storage: Option<Arc<dyn CacheStorage>>,

    /// File system for the persistent store (optional)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("version", &self.version)
            .field("origin", &self.origin)
            .field("max_audio_entries", &self.max_audio_entries)
            .field("routes", &self.routes)
            .field("precache_paths", &self.precache_paths)
            .field("shell_fallback_path", &self.shell_fallback_path)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("storage_quota_bytes", &self.storage_quota_bytes)
            .field("http_client", &"HttpClient { ... }")
            .field(
                "cache_storage",
                &self.cache_storage.as_ref().map(|_| "CacheStorage { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Version tag is not empty and contains no whitespace
    /// - Audio capacity is at least one entry
    /// - Route prefixes and timeouts are sane
    /// - An origin is present whenever shell assets must be precached
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::Config("Version tag cannot be empty".to_string()));
        }

        if self.version.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "Version tag '{}' must not contain whitespace",
                self.version
            )));
        }

        if self.max_audio_entries == 0 {
            return Err(Error::Config(
                "max_audio_entries must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }

        self.routes.validate()?;

        if !self.shell_fallback_path.starts_with('/') {
            return Err(Error::InvalidPrefix {
                name: "shell_fallback_path".to_string(),
                value: self.shell_fallback_path.clone(),
            });
        }

        if !self.precache_paths.is_empty() && self.origin.is_none() {
            return Err(Error::Config(
                "Precache paths configured but no origin set. \
                 Use .origin() or clear the precache list."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the origin. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Other hosts: inject a platform-native fetch adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to build default HttpClient: {}", e)))?;

    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    version: Option<String>,
    origin: Option<String>,
    max_audio_entries: Option<usize>,
    routes: Option<RouteConfig>,
    extra_endpoint_timeouts: Vec<EndpointTimeout>,
    api_timeout: Option<Duration>,
    precache_paths: Option<Vec<String>>,
    shell_fallback_path: Option<String>,
    event_buffer_size: Option<usize>,
    storage_quota_bytes: Option<u64>,
    http_client: Option<Arc<dyn HttpClient>>,
    cache_storage: Option<Arc<dyn CacheStorage>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    /// Sets the deployment version tag (required).
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the origin base URL, e.g. `https://music.example`.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.origin = Some(origin.trim_end_matches('/').to_string());
        self
    }

    /// Sets the audio cache capacity (default 40).
    pub fn max_audio_entries(mut self, entries: usize) -> Self {
        self.max_audio_entries = Some(entries);
        self
    }

    /// Replaces the whole routing table.
    pub fn routes(mut self, routes: RouteConfig) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Sets the default network-first timeout for API reads.
    pub fn api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = Some(timeout);
        self
    }

    /// Adds (or overrides) a timeout for one endpoint prefix.
    pub fn endpoint_timeout(mut self, prefix: impl Into<String>, timeout: Duration) -> Self {
        self.extra_endpoint_timeouts
            .push(EndpointTimeout::new(prefix, timeout));
        self
    }

    /// Sets the shell assets precached on install (default `["/"]`).
    pub fn precache_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the cache key used as the offline navigation fallback (default `/`).
    pub fn shell_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.shell_fallback_path = Some(path.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Caps the default in-memory store at `bytes`.
    pub fn storage_quota_bytes(mut self, bytes: u64) -> Self {
        self.storage_quota_bytes = Some(bytes);
        self
    }

    /// Injects the network fetch implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Injects the named cache primitive.
    pub fn cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.cache_storage = Some(storage);
        self
    }

    /// Injects file system access for the persistent store.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The version tag is missing
    /// - No `HttpClient` is provided and no desktop default is available
    /// - Any value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let version = self.version.ok_or_else(|| {
            Error::Config("Version tag is required. Use .version() to set it.".to_string())
        })?;

        let mut routes = self.routes.unwrap_or_default();
        if let Some(timeout) = self.api_timeout {
            routes.api_timeout = timeout;
        }
        for endpoint in self.extra_endpoint_timeouts {
            routes
                .endpoint_timeouts
                .retain(|existing| existing.prefix != endpoint.prefix);
            routes.endpoint_timeouts.push(endpoint);
        }

        let precache_paths = match self.precache_paths {
            Some(paths) => paths,
            None if self.origin.is_some() => vec!["/".to_string()],
            None => Vec::new(),
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            version,
            origin: self.origin,
            max_audio_entries: self.max_audio_entries.unwrap_or(DEFAULT_MAX_AUDIO_ENTRIES),
            routes,
            precache_paths,
            shell_fallback_path: self.shell_fallback_path.unwrap_or_else(|| "/".to_string()),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            storage_quota_bytes: self.storage_quota_bytes,
            http_client,
            cache_storage: self.cache_storage,
            file_system: self.file_system,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200))
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .version("v1")
            .http_client(Arc::new(StubHttpClient))
    }

    #[test]
    fn test_builder_requires_version() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Version tag is required"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let result = CoreConfig::builder().version("v1").build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.max_audio_entries, DEFAULT_MAX_AUDIO_ENTRIES);
        assert_eq!(config.routes, RouteConfig::default());
        assert!(config.precache_paths.is_empty());
        assert_eq!(config.shell_fallback_path, "/");
        assert!(config.cache_storage.is_none());
    }

    #[test]
    fn test_origin_implies_root_precache() {
        let config = builder().origin("https://music.example/").build().unwrap();

        assert_eq!(config.origin.as_deref(), Some("https://music.example"));
        assert_eq!(config.precache_paths, vec!["/".to_string()]);
    }

    #[test]
    fn test_precache_without_origin_is_rejected() {
        let result = builder().precache_paths(["/", "/static/app.js"]).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_audio_entries() {
        let result = builder().max_audio_entries(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_whitespace_version() {
        assert!(builder().version("  ").build().is_err());
        assert!(builder().version("v 2").build().is_err());
    }

    #[test]
    fn test_relative_prefix_is_rejected() {
        let routes = RouteConfig {
            audio_prefix: "play/".to_string(),
            ..RouteConfig::default()
        };

        let result = builder().routes(routes).build();
        assert!(matches!(
            result,
            Err(Error::InvalidPrefix { ref name, .. }) if name == "audio_prefix"
        ));
    }

    #[test]
    fn test_timeout_for_uses_longest_prefix() {
        let config = builder()
            .api_timeout(Duration::from_secs(4))
            .endpoint_timeout("/api/status/", Duration::from_secs(20))
            .endpoint_timeout("/api/status/slow", Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.routes.timeout_for("/api/playlists"), Duration::from_secs(4));
        assert_eq!(config.routes.timeout_for("/api/status/abc"), Duration::from_secs(20));
        assert_eq!(config.routes.timeout_for("/api/status/slow-job"), Duration::from_secs(60));
        assert_eq!(config.routes.timeout_for("/api/history"), HEAVY_ENDPOINT_TIMEOUT);
    }

    #[test]
    fn test_zero_endpoint_timeout_is_rejected() {
        let result = builder()
            .endpoint_timeout("/api/history", Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = builder().build().unwrap();
        let debug = format!("{:?}", config);

        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("version: \"v1\""));
    }
}
