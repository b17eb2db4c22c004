//! # rmz - A stream interception core
//!
//! rmz tracks intercepted TCP flows, decides what happens to each chunk of
//! their stream data, and hands the chunks it holds back to a single
//! consumer as length-prefixed binary records.
//!
//! ## Features
//!
//! * Flow registry - Which flows are subscribed to stream data, and by which callout
//! * Packet queue - Ordered, copy-on-enqueue FIFO with one blocking consumer
//! * Binary encoder - Bounds-checked little-endian record writer and reader
//! * Classification - Connect, stream-data, flow-delete and filter-notify decisions
//!
//! ## Architecture
//!
//! An [`network::Interceptor`] owns the registry, the queue and the
//! classifier for one load/unload cycle. The network stack is reached
//! through the [`network::classify::StreamAssociator`] trait; the consumer
//! is [`network::processing::run_relay`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rmz::prelude::*;
//! use std::sync::Arc;
//!
//! let state = RelayState::new(RelaySettings::default(), Arc::new(AcceptAllAssociator));
//! start_relay(&state, std::io::stdout())?;
//!
//! let script = load_script(std::path::Path::new("events.toml"))?;
//! run_replay(&state, &script)?;
//! stop_relay(&state)?;
//! # Ok::<(), RmzError>(())
//! ```

/// Relay lifecycle and replay commands
pub mod commands;
/// Centralized error handling
pub mod error;
/// Flow tracking, classification and relay
pub mod network;
/// Prelude for convenient imports
pub mod prelude;
/// Configuration settings for the interception core
pub mod settings;
/// Shared utility functions
pub mod utils;

// Re-export commonly used types
pub use error::{Result, RmzError};
