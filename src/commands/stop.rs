//! Stop relay command.
//!
//! Handles the shutdown of the consumer and the teardown of the interceptor.

use log::{error, info};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::state::RelayState;
use crate::error::{Result, RmzError};
use crate::network::UnloadReport;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of [`stop_relay`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// Records the consumer delivered before stopping
    pub delivered: u64,
    /// What the interceptor released
    pub unload: UnloadReport,
}

/// Stops the relay and unloads the interceptor.
///
/// Wakes the consumer, waits for it to exit, then removes every flow and
/// discards whatever is still queued. Packets queued after the consumer
/// woke up are never delivered.
///
/// # Returns
///
/// * `Ok(StopReport)` - If the consumer exited cleanly (or was never started)
/// * `Err(RmzError)` - The consumer's own error, after teardown has completed
pub fn stop_relay(state: &RelayState) -> Result<StopReport> {
    state.interceptor.shutdown();

    let handle = state.relay.lock().take();
    let delivered = match handle {
        Some(handle) => match handle.join() {
            Ok(result) => result,
            Err(_) => Err(RmzError::InvalidState(
                "Packet relay thread panicked".to_string(),
            )),
        },
        None => Ok(0),
    };
    state.running.store(false, Ordering::SeqCst);

    let unload = state.interceptor.unload();

    match delivered {
        Ok(delivered) => {
            info!("Stopped packet relay after {} records", delivered);
            Ok(StopReport { delivered, unload })
        }
        Err(e) => {
            error!("Packet relay error: {}", e);
            Err(e)
        }
    }
}

/// Waits until the consumer has delivered everything queued so far.
///
/// # Returns
///
/// `false` if `timeout` elapsed, the relay is not running, or the queue was
/// shut down first. A timeout too large to represent never elapses.
pub fn wait_for_idle(state: &RelayState, timeout: Duration) -> bool {
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let snapshot = state.interceptor.statistics().snapshot();
        if snapshot.packets_delivered + snapshot.packets_discarded >= snapshot.packets_queued {
            return true;
        }

        if !state.is_running()
            || state.interceptor.queue().is_shut_down()
            || deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            return false;
        }

        thread::sleep(IDLE_POLL_INTERVAL);
    }
}
