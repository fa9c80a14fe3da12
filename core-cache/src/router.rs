//! # Router
//!
//! Classifies an intercepted request into a resource class, a strategy and a
//! target cache. Pure: no I/O happens here.
//!
//! Rules, first match wins:
//!
//! 1. audio prefix → LRU audio cache
//! 2. thumbnail prefix, GET → stale-while-revalidate, thumbnail cache
//! 3. auth prefix → network only, no cache involvement
//! 4. API prefix, non-GET → network only
//! 5. API prefix, GET → network first with the endpoint's timeout, API cache
//! 6. any other non-GET → network only
//! 7. everything else → cache first, shell cache

use crate::version::CacheNames;
use bridge_traits::{HttpMethod, HttpRequest};
use core_runtime::config::RouteConfig;
use std::time::Duration;

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Audio,
    Thumbnail,
    Auth,
    Api,
    Shell,
}

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Bounded audio cache with range slicing
    AudioLru,
    CacheFirst,
    NetworkFirst { timeout: Duration },
    StaleWhileRevalidate,
    /// Straight to the network; never reads or writes a cache
    NetworkOnly,
}

/// Result of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub class: ResourceClass,
    pub strategy: Strategy,
    /// Target cache, `None` for network-only routes
    pub cache_name: Option<String>,
    /// Query-less request path
    pub path: String,
}

/// Path component of a request URL, without query string or fragment.
///
/// Absolute URLs are parsed; relative ones are cut at the first `?` or `#`.
pub fn request_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            let path = &url[..end];
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        }
    }
}

/// Whether the request is a top-level page navigation.
pub fn is_navigation(request: &HttpRequest) -> bool {
    if request
        .header_value("sec-fetch-mode")
        .is_some_and(|mode| mode.eq_ignore_ascii_case("navigate"))
    {
        return true;
    }

    request.method == HttpMethod::Get
        && request
            .header_value("accept")
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Request classifier for one deployment.
#[derive(Debug, Clone)]
pub struct Router {
    routes: RouteConfig,
    names: CacheNames,
}

impl Router {
    pub fn new(routes: RouteConfig, names: CacheNames) -> Self {
        Self { routes, names }
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Classify `request`.
    pub fn route(&self, request: &HttpRequest) -> RouteDecision {
        let path = request_path(&request.url);
        let is_get = request.method == HttpMethod::Get;

        let (class, strategy, cache_name) = if path.starts_with(&self.routes.audio_prefix) {
            (
                ResourceClass::Audio,
                Strategy::AudioLru,
                Some(self.names.audio()),
            )
        } else if is_get && path.starts_with(&self.routes.thumbnail_prefix) {
            (
                ResourceClass::Thumbnail,
                Strategy::StaleWhileRevalidate,
                Some(self.names.thumbnails()),
            )
        } else if path.starts_with(&self.routes.auth_prefix) {
            (ResourceClass::Auth, Strategy::NetworkOnly, None)
        } else if path.starts_with(&self.routes.api_prefix) {
            if is_get {
                let timeout = self.routes.timeout_for(&path);
                (
                    ResourceClass::Api,
                    Strategy::NetworkFirst { timeout },
                    Some(self.names.api()),
                )
            } else {
                (ResourceClass::Api, Strategy::NetworkOnly, None)
            }
        } else if !is_get {
            (ResourceClass::Shell, Strategy::NetworkOnly, None)
        } else {
            (
                ResourceClass::Shell,
                Strategy::CacheFirst,
                Some(self.names.shell()),
            )
        };

        RouteDecision {
            class,
            strategy,
            cache_name: cache_name.map(str::to_string),
            path,
        }
    }
}
