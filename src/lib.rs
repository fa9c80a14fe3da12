//! Workspace umbrella crate.
//!
//! Re-exports [`core_service`] so host applications can depend on
//! `playback-cache-workspace` and pick platform support through features
//! (`desktop-shims` by default) without wiring each crate individually.

pub use core_service::*;
