use clap::Args;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_wait_timeout_ms() -> u64 {
    1000
}

fn default_stats_interval_ms() -> u64 {
    2000
}

fn default_stream_callout_id() -> u32 {
    1
}

/// Options for the interception core and its consumer.
#[derive(Args, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// How long the consumer waits for data before re-checking state, in milliseconds
    #[arg(long = "wait-timeout-ms", default_value_t = default_wait_timeout_ms())]
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Maximum number of queued packets (0 = unbounded)
    #[arg(long = "max-queued-packets", default_value_t = 0)]
    #[serde(default)]
    pub max_queued_packets: usize,

    /// Queue an empty new-connection record whenever a flow is associated
    #[arg(long = "announce-connections")]
    #[serde(default)]
    pub announce_connections: bool,

    /// Id of the stream callout that owns associated flows
    #[arg(long = "stream-callout-id", default_value_t = default_stream_callout_id())]
    #[serde(default = "default_stream_callout_id")]
    pub stream_callout_id: u32,

    /// Interval between statistics log lines, in milliseconds (0 = never)
    #[arg(long = "stats-interval-ms", default_value_t = default_stats_interval_ms())]
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            max_queued_packets: 0,
            announce_connections: false,
            stream_callout_id: default_stream_callout_id(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

impl RelaySettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// `None` when periodic statistics are disabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_ms > 0).then(|| Duration::from_millis(self.stats_interval_ms))
    }
}
