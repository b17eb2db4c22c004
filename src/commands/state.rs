//! Application state for the relay.
//!
//! This module contains the shared state used by the start, stop, status
//! and replay commands.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::Result;
use crate::network::classify::StreamAssociator;
use crate::network::Interceptor;
use crate::settings::RelaySettings;

/// Shared state for one run of the relay.
///
/// Holds the interception context, the settings it was built from, and the
/// consumer thread once it has been started.
pub struct RelayState {
    /// Flag indicating whether the consumer thread is active
    pub running: Arc<AtomicBool>,
    /// Settings the interceptor was created with
    pub settings: RelaySettings,
    /// The interception context
    pub interceptor: Arc<Interceptor>,
    /// Consumer thread, present while running
    pub relay: Mutex<Option<JoinHandle<Result<u64>>>>,
}

impl RelayState {
    /// Creates the interceptor for `settings`.
    pub fn new(settings: RelaySettings, associator: Arc<dyn StreamAssociator>) -> Self {
        let interceptor = Arc::new(Interceptor::new(&settings, associator));

        Self {
            running: Arc::new(AtomicBool::new(false)),
            settings,
            interceptor,
            relay: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
