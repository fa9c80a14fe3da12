//! Named Cache Store implementations.
//!
//! - [`MemoryCacheStorage`] keeps everything in process (default).
//! - [`FsCacheStorage`] persists caches through [`FileSystemAccess`](bridge_traits::FileSystemAccess).

mod filesystem;
mod memory;

pub use filesystem::{FsCache, FsCacheStorage};
pub use memory::{MemoryCache, MemoryCacheStorage};
