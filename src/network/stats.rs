use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for classifier and queue outcomes.
///
/// Updated from classify callbacks, so every field is a relaxed atomic;
/// readers take a [`StatisticsSnapshot`].
#[derive(Debug, Default)]
pub struct RelayStatistics {
    connects: AtomicU64,
    flows_associated: AtomicU64,
    association_failures: AtomicU64,
    flows_removed: AtomicU64,
    packets_queued: AtomicU64,
    packets_dropped: AtomicU64,
    packets_delivered: AtomicU64,
    packets_discarded: AtomicU64,
    stream_permitted: AtomicU64,
    stream_blocked: AtomicU64,
}

/// Point-in-time copy of [`RelayStatistics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// Connect classify calls seen
    pub connects: u64,
    /// Flows subscribed to stream data
    pub flows_associated: u64,
    /// Flows that could not be subscribed
    pub association_failures: u64,
    /// Flows removed by flow-delete or unload
    pub flows_removed: u64,
    /// Packets pushed onto the queue
    pub packets_queued: u64,
    /// Stream chunks not queued (unknown flow or allocation failure)
    pub packets_dropped: u64,
    /// Records handed to the consumer
    pub packets_delivered: u64,
    /// Queued packets the consumer could not encode
    pub packets_discarded: u64,
    /// Stream classify calls that returned permit
    pub stream_permitted: u64,
    /// Stream classify calls that returned block
    pub stream_blocked: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RelayStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        bump(&self.connects);
    }

    pub fn record_association(&self, succeeded: bool) {
        if succeeded {
            bump(&self.flows_associated);
        } else {
            bump(&self.association_failures);
        }
    }

    pub fn record_flow_removed(&self) {
        bump(&self.flows_removed);
    }

    pub fn record_queued(&self) {
        bump(&self.packets_queued);
    }

    pub fn record_dropped(&self) {
        bump(&self.packets_dropped);
    }

    pub fn record_delivered(&self, count: u64) {
        self.packets_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        bump(&self.packets_discarded);
    }

    /// Records the final decision of a stream classify call.
    pub fn record_stream_decision(&self, permitted: bool) {
        if permitted {
            bump(&self.stream_permitted);
        } else {
            bump(&self.stream_blocked);
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            flows_associated: self.flows_associated.load(Ordering::Relaxed),
            association_failures: self.association_failures.load(Ordering::Relaxed),
            flows_removed: self.flows_removed.load(Ordering::Relaxed),
            packets_queued: self.packets_queued.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_delivered: self.packets_delivered.load(Ordering::Relaxed),
            packets_discarded: self.packets_discarded.load(Ordering::Relaxed),
            stream_permitted: self.stream_permitted.load(Ordering::Relaxed),
            stream_blocked: self.stream_blocked.load(Ordering::Relaxed),
        }
    }
}

impl StatisticsSnapshot {
    /// Fraction of stream chunks that reached the queue.
    ///
    /// Returns 0.0 if nothing was classified yet.
    pub fn queue_rate(&self) -> f64 {
        let total = self.packets_queued + self.packets_dropped;
        if total == 0 {
            return 0.0;
        }

        self.packets_queued as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_statistics() {
        let stats = RelayStatistics::new();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
        assert_eq!(stats.snapshot().queue_rate(), 0.0);
    }

    #[test]
    fn test_record_counts() {
        let stats = RelayStatistics::new();

        stats.record_connect();
        stats.record_association(true);
        stats.record_association(false);
        stats.record_queued();
        stats.record_queued();
        stats.record_queued();
        stats.record_dropped();
        stats.record_delivered(2);
        stats.record_discarded();
        stats.record_stream_decision(false);
        stats.record_stream_decision(true);

        let snap = stats.snapshot();
        assert_eq!(snap.connects, 1);
        assert_eq!(snap.flows_associated, 1);
        assert_eq!(snap.association_failures, 1);
        assert_eq!(snap.packets_queued, 3);
        assert_eq!(snap.packets_dropped, 1);
        assert_eq!(snap.packets_delivered, 2);
        assert_eq!(snap.packets_discarded, 1);
        assert_eq!(snap.stream_blocked, 1);
        assert_eq!(snap.stream_permitted, 1);
        assert_eq!(snap.queue_rate(), 0.75);
    }
}
