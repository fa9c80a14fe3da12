//! # Preloader
//!
//! Warms the audio cache with the next queue item while the current one
//! plays.
//!
//! At most one preload runs at a time. Starting another cancels the previous
//! one, which drops its in-flight fetch, so rapid skipping does not pile up
//! downloads. Once the body has arrived, storing and trimming run to
//! completion even if a cancel lands meanwhile. Foreground requests never go
//! through here and are never cancelled.

use crate::audio::LruAudioCache;
use bridge_traits::HttpRequest;
use core_runtime::events::{CacheEvent, EventBus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happened to a preload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStatus {
    /// Entry already stored; nothing fetched
    AlreadyCached,
    /// Background fetch spawned
    Started,
}

struct InFlight {
    key: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background audio preloader.
pub struct Preloader {
    audio: Arc<LruAudioCache>,
    event_bus: Option<EventBus>,
    current: Mutex<Option<InFlight>>,
}

impl Preloader {
    pub fn new(audio: Arc<LruAudioCache>) -> Self {
        Self {
            audio,
            event_bus: None,
            current: Mutex::new(None),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_cache(event);
        }
    }

    /// Preload `url`, superseding any preload still running.
    pub async fn preload(&self, url: &str) -> PreloadStatus {
        let key = LruAudioCache::key_for(url);
        let mut current = self.current.lock().await;

        if let Some(previous) = current.take() {
            self.stop(previous);
        }

        if self.audio.contains(url).await {
            debug!(key = %key, "Preload target already cached");
            return PreloadStatus::AlreadyCached;
        }

        let token = CancellationToken::new();
        let audio = self.audio.clone();
        let event_bus = self.event_bus.clone();
        // Plain GET: a ranged answer would not be stored
        let request = HttpRequest::get(url);
        let task_key = key.clone();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            // Only the download is abortable; a stored entry is always trimmed
            let fetched = tokio::select! {
                _ = task_token.cancelled() => return,
                result = audio.fetch(request) => result,
            };

            let stored = match fetched {
                Ok(response) => audio.store(&task_key, &response).await,
                Err(e) => {
                    warn!(key = %task_key, error = %e, "Preload failed");
                    false
                }
            };
            info!(key = %task_key, stored, "Preload finished");
            if let Some(bus) = event_bus {
                bus.emit_cache(CacheEvent::PreloadCompleted { key: task_key, stored });
            }
        });

        self.emit(CacheEvent::PreloadStarted { key: key.clone() });
        *current = Some(InFlight { key, token, handle });
        PreloadStatus::Started
    }

    /// Cancel the running preload. Returns `true` if one was running.
    pub async fn cancel(&self) -> bool {
        match self.current.lock().await.take() {
            Some(in_flight) => self.stop(in_flight),
            None => false,
        }
    }

    /// Key of the unfinished preload, if any.
    pub async fn in_flight(&self) -> Option<String> {
        let current = self.current.lock().await;
        current
            .as_ref()
            .filter(|in_flight| !in_flight.handle.is_finished())
            .map(|in_flight| in_flight.key.clone())
    }

    fn stop(&self, in_flight: InFlight) -> bool {
        if in_flight.handle.is_finished() {
            return false;
        }
        in_flight.token.cancel();
        debug!(key = %in_flight.key, "Preload cancelled");
        self.emit(CacheEvent::PreloadCancelled { key: in_flight.key });
        true
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.try_lock() {
            if let Some(in_flight) = current.take() {
                in_flight.token.cancel();
            }
        }
    }
}
