//! Network module for stream interception and relay.
//!
//! This module contains the components that track intercepted flows,
//! decide what happens to their stream data, and hand queued data to the
//! single consumer.

pub mod classify;
pub mod codec;
pub mod core;
pub mod interceptor;
pub mod processing;
pub mod stats;

pub use interceptor::{Interceptor, UnloadReport};
