//! Utility functions for the relay.
//!
//! This module contains shared utility functions used throughout the application.

use log::info;

use crate::network::stats::StatisticsSnapshot;

/// Logs relay statistics including queued, dropped and delivered packets.
///
/// # Arguments
///
/// * `snapshot` - Counters to report
/// * `queue_len` - Packets currently waiting for the consumer
pub fn log_statistics(snapshot: &StatisticsSnapshot, queue_len: usize) {
    info!(
        "Flows: {} associated, {} failed, {} removed | Packets: {} queued, {} delivered, {} discarded, {} dropped ({:.2}% queued), {} pending",
        snapshot.flows_associated,
        snapshot.association_failures,
        snapshot.flows_removed,
        snapshot.packets_queued,
        snapshot.packets_delivered,
        snapshot.packets_discarded,
        snapshot.packets_dropped,
        snapshot.queue_rate() * 100.0,
        queue_len
    );
}

/// Renders payload bytes for log output, escaping anything non-printable.
///
/// Output is cut at `limit` input bytes.
pub fn preview_payload(payload: &[u8], limit: usize) -> String {
    let shown = &payload[..payload.len().min(limit)];
    let mut preview: String = shown
        .iter()
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect();

    if payload.len() > limit {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_payload() {
        assert_eq!(preview_payload(b"GET /", 16), "GET /");
        assert_eq!(preview_payload(b"\x00\x01ab", 16), "\\x00\\x01ab");
        assert_eq!(preview_payload(b"abcdef", 3), "abc...");
        assert_eq!(preview_payload(b"", 3), "");
    }
}
