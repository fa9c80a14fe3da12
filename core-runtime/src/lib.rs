//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the cache layer:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on.
//! It fixes how the layer is configured, how it logs, and how it announces
//! changes to cached state.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, EndpointTimeout, RouteConfig};
pub use error::{Error, Result};
