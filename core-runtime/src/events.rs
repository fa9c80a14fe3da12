//! # Event Bus System
//!
//! Broadcasts what the cache layer does (stores, evictions, version changes,
//! preloads) to any number of observers using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`CacheEvent`] for entry-level changes and
//!   [`LifecycleEvent`] for install/activate transitions
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Emitting never blocks request handling. With no subscribers, `emit`
//! returns an error that callers ignore.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Cache(CacheEvent::AudioCacheCleared { removed: 3 }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Audio cache cleared");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Entry-level cache changes
    Cache(CacheEvent),
    /// Install / activate transitions
    Lifecycle(LifecycleEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Lifecycle(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::WriteFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::CorruptEntryEvicted { .. }) => EventSeverity::Warning,
            CoreEvent::Lifecycle(LifecycleEvent::Installed { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Cache(CacheEvent::AudioCacheCleared { .. }) => EventSeverity::Info,
            CoreEvent::Lifecycle(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events describing changes to cached entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A full audio object was written to the audio cache.
    AudioEntryStored {
        /// Query-less request path used as the key
        key: String,
        size_bytes: u64,
    },
    /// The audio cache exceeded capacity and its oldest entries were removed.
    AudioEntriesEvicted { keys: Vec<String> },
    /// Every audio entry was removed on request.
    AudioCacheCleared { removed: usize },
    /// A cache from an older deployment version was deleted.
    StaleCacheDeleted { cache_name: String },
    /// A stored entry failed its integrity check and was removed.
    CorruptEntryEvicted { cache_name: String, key: String },
    /// A cache write was refused by the store; the response was still served.
    WriteFailed {
        cache_name: String,
        key: String,
        reason: String,
    },
    /// Background audio preload began.
    PreloadStarted { key: String },
    /// Background audio preload was superseded or cancelled.
    PreloadCancelled { key: String },
    /// Background audio preload finished.
    PreloadCompleted { key: String, stored: bool },
}

impl CacheEvent {
    pub fn description(&self) -> &str {
        match self {
            CacheEvent::AudioEntryStored { .. } => "Audio entry stored",
            CacheEvent::AudioEntriesEvicted { .. } => "Audio entries evicted",
            CacheEvent::AudioCacheCleared { .. } => "Audio cache cleared",
            CacheEvent::StaleCacheDeleted { .. } => "Stale cache deleted",
            CacheEvent::CorruptEntryEvicted { .. } => "Corrupt entry evicted",
            CacheEvent::WriteFailed { .. } => "Cache write failed",
            CacheEvent::PreloadStarted { .. } => "Preload started",
            CacheEvent::PreloadCancelled { .. } => "Preload cancelled",
            CacheEvent::PreloadCompleted { .. } => "Preload completed",
        }
    }
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Install and activation transitions of a deployment version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// Shell assets were precached for a new version.
    Installed {
        version: String,
        precached: usize,
        failed: usize,
    },
    /// A version took over and stale caches were collected.
    Activated {
        version: String,
        deleted_caches: Vec<String>,
    },
}

impl LifecycleEvent {
    pub fn description(&self) -> &str {
        match self {
            LifecycleEvent::Installed { .. } => "Version installed",
            LifecycleEvent::Activated { .. } => "Version activated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Shorthand for emitting a [`CacheEvent`], ignoring absent subscribers.
    pub fn emit_cache(&self, event: CacheEvent) {
        let _ = self.sender.send(CoreEvent::Cache(event));
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let lifecycle_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Lifecycle(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(key: &str) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::AudioEntryStored {
            key: key.to_string(),
            size_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(stored("/play/a.m4a")).is_err());

        // The shorthand must not panic either
        bus.emit_cache(CacheEvent::AudioCacheCleared { removed: 0 });
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = stored("/play/a.m4a");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Lifecycle(_)));

        bus.emit(stored("/play/a.m4a")).unwrap();
        let activated = CoreEvent::Lifecycle(LifecycleEvent::Activated {
            version: "v2".to_string(),
            deleted_caches: vec!["api-v1".to_string()],
        });
        bus.emit(activated.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), activated);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(stored(&format!("/play/{}.m4a", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Cache(CacheEvent::WriteFailed {
            cache_name: "audio-cache".to_string(),
            key: "/play/a.m4a".to_string(),
            reason: "quota".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);

        let partial_install = CoreEvent::Lifecycle(LifecycleEvent::Installed {
            version: "v1".to_string(),
            precached: 1,
            failed: 1,
        });
        assert_eq!(partial_install.severity(), EventSeverity::Warning);

        assert_eq!(stored("/play/a.m4a").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::StaleCacheDeleted {
            cache_name: "api-v1".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "StaleCacheDeleted");
        assert_eq!(json["payload"]["cache_name"], "api-v1");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
