//! # Cache Error Types
//!
//! Errors raised inside the cache layer. None of them reach the caller of
//! [`CacheLayer::handle`](crate::CacheLayer::handle): strategies collapse
//! every failure into a response at their boundary.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur while serving or maintaining caches.
#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Network Errors
    // ========================================================================
    /// The origin could not be reached.
    #[error("Network request failed: {0}")]
    Network(String),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// The store refused a write (quota, disk full, I/O).
    #[error("Cache write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    /// A stored body does not match its recorded length.
    #[error("Corrupt cache entry {key}: expected {expected} bytes, found {actual}")]
    CorruptEntry {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Any other failure of the underlying store.
    #[error("Cache storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Control / Configuration Errors
    // ========================================================================
    /// A control message could not be understood.
    #[error("Invalid control command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl CacheError {
    /// Returns `true` if retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Network(_) | CacheError::WriteFailed { .. })
    }

    /// Returns `true` for failures that callers swallow after logging.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, CacheError::WriteFailed { .. })
    }

    /// Wraps a store failure that happened while writing `key`.
    pub(crate) fn write_failed(key: &str, err: BridgeError) -> Self {
        CacheError::WriteFailed {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<BridgeError> for CacheError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NetworkUnavailable(msg) => CacheError::Network(msg),
            other => CacheError::Storage(other.to_string()),
        }
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
