//! # Host Bridge Traits
//!
//! Platform abstraction traits consumed by the request-interception cache
//! layer.
//!
//! ## Overview
//!
//! The cache layer sits between a media-playback client and its origin
//! server. It needs exactly two things from the outside world, and each is a
//! trait here so that every host (desktop, mobile, tests) can plug in its own
//! implementation:
//!
//! - [`HttpClient`](http::HttpClient) - perform a real network fetch
//! - [`CacheStorage`](cache_storage::CacheStorage) - the named response-cache primitive
//!
//! Supporting seams:
//!
//! - [`FileSystemAccess`](storage::FileSystemAccess) - file I/O for persistent caches
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map transport failures to `NetworkUnavailable` and host storage
//! refusals to `QuotaExceeded`; the cache layer relies on that distinction to
//! decide between falling back to cache and swallowing a write failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so handles can be shared across the
//! independent tasks that serve concurrent requests.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod cache_storage;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache_storage::{CacheStorage, NamedCache};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::FileSystemAccess;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
