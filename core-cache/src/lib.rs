//! # Request-Interception Cache Layer
//!
//! Sits between a media-playback client and its origin and decides, per
//! resource class, whether to answer from a local cache, the network, or
//! both.
//!
//! ## Overview
//!
//! - [`router`] classifies requests by path prefix
//! - [`strategy`] holds the cache-first, network-first and
//!   stale-while-revalidate executors
//! - [`audio`] is the bounded LRU cache of audio objects, answering byte
//!   ranges through [`range`]
//! - [`version`] names per-deployment caches and deletes stale ones
//! - [`preload`] warms the audio cache in the background
//! - [`storage`] provides in-memory and on-disk named cache stores
//! - [`CacheLayer`] ties them together for one deployment
//!
//! ## Error Handling
//!
//! [`CacheLayer::handle`] never fails. Network failures become cached
//! fallbacks or synthetic `503`s; cache write failures are logged and
//! dropped.

pub mod audio;
pub mod control;
pub mod error;
pub mod layer;
pub mod preload;
pub mod range;
pub mod responses;
pub mod router;
pub mod stats;
pub mod storage;
pub mod strategy;
pub mod version;

pub use audio::LruAudioCache;
pub use control::{CommandOutcome, ControlCommand};
pub use error::{CacheError, Result};
pub use layer::{CacheLayer, InstallReport};
pub use preload::{PreloadStatus, Preloader};
pub use router::{ResourceClass, RouteDecision, Router, Strategy};
pub use stats::{CacheStats, NamedCacheStats};
pub use storage::{FsCacheStorage, MemoryCacheStorage};
pub use strategy::{
    CacheFirst, FetchStrategy, NetworkFirst, NetworkOnly, StaleWhileRevalidate, StrategyContext,
};
pub use version::{CacheNames, VersionManager, AUDIO_CACHE_NAME};
