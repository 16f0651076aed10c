//! # Core Runtime
//!
//! Foundational infrastructure for the playback engine:
//! - Engine configuration: the explicit context object assembling every
//!   injected collaborator, with fail-fast validation
//! - Typed event bus over `tokio::sync::broadcast`
//! - Logging bootstrap on top of `tracing-subscriber`
//!
//! There are no process-wide singletons anywhere in the engine: hosts
//! build one [`config::EngineConfig`], hand it to the player, and drive
//! the `init()`/`shutdown()` lifecycle themselves.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
