//! Cache statistics.

use serde::{Deserialize, Serialize};

/// Usage of one named cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCacheStats {
    pub name: String,
    pub entries: usize,
    /// Sum of stored body sizes
    pub total_bytes: u64,
}

/// Snapshot of every cache the layer owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub version: String,
    pub caches: Vec<NamedCacheStats>,
    /// Audio capacity in entries
    pub max_audio_entries: usize,
    /// Timestamp when stats were calculated
    pub calculated_at: i64,
}

impl CacheStats {
    pub fn cache(&self, name: &str) -> Option<&NamedCacheStats> {
        self.caches.iter().find(|cache| cache.name == name)
    }

    pub fn total_entries(&self) -> usize {
        self.caches.iter().map(|cache| cache.entries).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.caches.iter().map(|cache| cache.total_bytes).sum()
    }

    /// Audio fill level as a percentage of capacity.
    pub fn audio_usage_percentage(&self, audio_cache: &str) -> f64 {
        if self.max_audio_entries == 0 {
            return 0.0;
        }
        let entries = self.cache(audio_cache).map_or(0, |cache| cache.entries);
        (entries as f64 / self.max_audio_entries as f64) * 100.0
    }

    /// Returns true if the audio cache is at capacity.
    pub fn is_audio_full(&self, audio_cache: &str) -> bool {
        self.cache(audio_cache)
            .is_some_and(|cache| cache.entries >= self.max_audio_entries)
    }
}
