//! Start relay command.
//!
//! Launches the consumer thread that turns queued packets into records.

use log::info;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::commands::state::RelayState;
use crate::error::{Result, RmzError};
use crate::network::processing::{spawn_relay, RelayConfig};

/// Starts relaying queued packets to `sink`.
///
/// # Arguments
///
/// * `state` - The relay state holding the interceptor
/// * `sink` - Destination for encoded records
///
/// # Returns
///
/// * `Ok(())` - If the consumer thread was started
/// * `Err(RmzError::InvalidState)` - If the relay is already running or the interceptor was unloaded
pub fn start_relay<W>(state: &RelayState, sink: W) -> Result<()>
where
    W: Write + Send + 'static,
{
    if state.interceptor.is_unloaded() {
        return Err(RmzError::InvalidState(
            "Interceptor has been unloaded".to_string(),
        ));
    }

    if state.running.swap(true, Ordering::SeqCst) {
        return Err(RmzError::InvalidState(
            "Packet relay already running".to_string(),
        ));
    }

    let config = RelayConfig {
        wait_timeout: state.settings.wait_timeout(),
        stats_interval: state.settings.stats_interval(),
    };

    let handle = spawn_relay(
        Arc::clone(state.interceptor.queue()),
        sink,
        Arc::clone(state.interceptor.statistics()),
        config,
    );
    *state.relay.lock() = Some(handle);

    info!("Started packet relay");
    Ok(())
}
