//! Status query.

use crate::commands::state::RelayState;
use crate::network::stats::StatisticsSnapshot;

/// Current state of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatus {
    pub running: bool,
    pub unloaded: bool,
    pub tracked_flows: usize,
    pub queued_packets: usize,
    pub statistics: StatisticsSnapshot,
}

/// Gets the current status of the relay.
pub fn get_status(state: &RelayState) -> RelayStatus {
    let interceptor = &state.interceptor;

    RelayStatus {
        running: state.is_running(),
        unloaded: interceptor.is_unloaded(),
        tracked_flows: interceptor.registry().len(),
        queued_packets: interceptor.queue().len(),
        statistics: interceptor.statistics().snapshot(),
    }
}
