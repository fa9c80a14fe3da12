//! # Version Manager
//!
//! Names the caches of one deployment and garbage-collects the rest.
//!
//! ## Overview
//!
//! Shell, API and thumbnail caches carry the deployment's version tag in
//! their name (`shell-{v}`, `api-{v}`, `thumbnails-{v}`). The audio cache is
//! named without a version so downloaded tracks survive app updates; it is
//! only emptied by an explicit clear command.

use crate::error::Result;
use bridge_traits::CacheStorage;
use core_runtime::events::{CacheEvent, EventBus};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Name of the version-independent audio cache.
pub const AUDIO_CACHE_NAME: &str = "audio-cache";

/// Cache names for one deployment version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    version: String,
    shell: String,
    api: String,
    thumbnails: String,
}

impl CacheNames {
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            shell: format!("shell-{}", version),
            api: format!("api-{}", version),
            thumbnails: format!("thumbnails-{}", version),
            version,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn thumbnails(&self) -> &str {
        &self.thumbnails
    }

    pub fn audio(&self) -> &str {
        AUDIO_CACHE_NAME
    }

    /// Every cache this deployment owns, audio included.
    pub fn current(&self) -> [&str; 4] {
        [&self.shell, &self.api, &self.thumbnails, AUDIO_CACHE_NAME]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current().contains(&name)
    }
}

/// Deletes caches left behind by earlier deployments.
pub struct VersionManager {
    storage: Arc<dyn CacheStorage>,
    names: CacheNames,
    event_bus: Option<EventBus>,
}

impl VersionManager {
    pub fn new(storage: Arc<dyn CacheStorage>, names: CacheNames) -> Self {
        Self {
            storage,
            names,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    /// Deletes every cache not in [`CacheNames::current`].
    ///
    /// Returns the deleted names. A cache that fails to delete is logged and
    /// left for the next activation.
    #[instrument(skip(self), fields(version = %self.names.version()))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();

        for name in self.storage.keys().await? {
            if self.names.is_current(&name) {
                continue;
            }

            match self.storage.delete(&name).await {
                Ok(true) => {
                    info!(cache = %name, "Deleted stale cache");
                    if let Some(bus) = &self.event_bus {
                        bus.emit_cache(CacheEvent::StaleCacheDeleted {
                            cache_name: name.clone(),
                        });
                    }
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => warn!(cache = %name, error = %e, "Failed to delete stale cache"),
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCacheStorage;

    #[test]
    fn test_cache_names() {
        let names = CacheNames::new("v7");
        assert_eq!(names.shell(), "shell-v7");
        assert_eq!(names.api(), "api-v7");
        assert_eq!(names.thumbnails(), "thumbnails-v7");
        assert_eq!(names.audio(), "audio-cache");

        assert!(names.is_current("audio-cache"));
        assert!(!names.is_current("shell-v6"));
    }

    #[tokio::test]
    async fn test_activate_keeps_current_and_audio() {
        let storage = Arc::new(MemoryCacheStorage::new());
        for name in ["shell-v1", "api-v1", "thumbnails-v1", "audio-cache", "shell-v2", "api-v2"] {
            storage.open(name).await.unwrap();
        }

        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let manager =
            VersionManager::new(storage.clone(), CacheNames::new("v2")).with_event_bus(bus);

        let mut deleted = manager.activate().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["api-v1", "shell-v1", "thumbnails-v1"]);

        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["api-v2", "audio-cache", "shell-v2"]
        );
        assert!(events.try_recv().is_ok());

        // Second activation has nothing left to do
        assert!(manager.activate().await.unwrap().is_empty());
    }
}
