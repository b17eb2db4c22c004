//! Scripted event replay.
//!
//! Drives the classifier with connect, stream, flow-delete and filter
//! events read from a TOML script, standing in for the network stack.
//!
//! # Example
//!
//! ```toml
//! [[event]]
//! kind = "connect"
//! flow = 42
//!
//! [[event]]
//! kind = "stream"
//! flow = 42
//! direction = "send"
//! data = "GET / HTTP/1.1\r\n\r\n"
//!
//! [[event]]
//! kind = "delete"
//! flow = 42
//! ```

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::commands::state::RelayState;
use crate::error::{Result, RmzError};
use crate::network::classify::{
    Action, ClassifyOut, FilterFlags, FilterInfo, IncomingMetadata, IncomingValues, Layer,
    NotifyType, StreamData, StreamFlags,
};
use crate::utils::preview_payload;

/// IP version of the layers an event is reported on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

impl IpVersion {
    fn flow_established_layer(self) -> Layer {
        match self {
            IpVersion::V4 => Layer::AleFlowEstablishedV4,
            IpVersion::V6 => Layer::AleFlowEstablishedV6,
        }
    }

    fn stream_layer(self) -> Layer {
        match self {
            IpVersion::V4 => Layer::StreamV4,
            IpVersion::V6 => Layer::StreamV6,
        }
    }
}

/// Which side of the connection sent a stream chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outbound, client to server
    #[default]
    Send,
    /// Inbound, server to client
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterChange {
    Add,
    Delete,
}

/// One scripted network event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// A flow reaches the flow-established layer
    Connect {
        flow: u64,
        #[serde(default)]
        ip: IpVersion,
        #[serde(default)]
        clear_action_right: bool,
    },
    /// A chunk of stream data for a flow
    Stream {
        flow: u64,
        #[serde(default)]
        ip: IpVersion,
        #[serde(default)]
        direction: Direction,
        #[serde(default)]
        data: String,
        #[serde(default)]
        disconnect: bool,
    },
    /// The stack tears a flow down
    Delete {
        flow: u64,
        #[serde(default)]
        ip: IpVersion,
        /// Reporting callout; the configured stream callout if omitted
        #[serde(default)]
        callout: Option<u32>,
    },
    /// A filter was added or removed
    Filter { change: FilterChange, id: u64 },
    /// Pause before the next event
    Sleep { ms: u64 },
}

/// A parsed replay script.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(rename = "event", default)]
    pub events: Vec<ReplayEvent>,
}

/// What happened while a script was replayed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events handed to the classifier
    pub events: usize,
    /// Connect events the classifier rejected as duplicates
    pub duplicate_flows: usize,
    /// Stream events that were blocked (and queued)
    pub stream_blocked: usize,
    /// Stream events that were permitted
    pub stream_permitted: usize,
    /// Delete events that removed a tracked flow
    pub flows_deleted: usize,
    /// Whether replay stopped early because of shutdown
    pub interrupted: bool,
}

/// Loads a replay script from a TOML file.
pub fn load_script(path: &Path) -> Result<ReplayScript> {
    let content = fs::read_to_string(path)?;
    let script = parse_script(&content)?;

    info!(
        "Loaded {} replay events from {}",
        script.events.len(),
        path.display()
    );
    Ok(script)
}

/// Parses a replay script from TOML text.
pub fn parse_script(content: &str) -> Result<ReplayScript> {
    toml::from_str(content).map_err(|e| RmzError::Script(e.to_string()))
}

/// Replays every event in `script` against the interceptor in `state`.
///
/// Stops early once the queue has been shut down. Duplicate connects are
/// logged and counted; replay carries on after them.
pub fn run_replay(state: &RelayState, script: &ReplayScript) -> Result<ReplayReport> {
    let interceptor = &state.interceptor;
    let classifier = interceptor.classifier();
    let mut report = ReplayReport::default();

    for event in &script.events {
        if interceptor.queue().is_shut_down() {
            info!("Replay interrupted after {} events", report.events);
            report.interrupted = true;
            break;
        }

        match event {
            ReplayEvent::Connect {
                flow,
                ip,
                clear_action_right,
            } => {
                let mut filter = FilterInfo::default();
                if *clear_action_right {
                    filter.flags.insert(FilterFlags::CLEAR_ACTION_RIGHT);
                }

                let mut out = ClassifyOut::default();
                let result = classifier.classify_connect(
                    &IncomingValues {
                        layer: ip.flow_established_layer(),
                    },
                    &IncomingMetadata { flow_handle: *flow },
                    &filter,
                    &mut out,
                );

                match result {
                    Ok(()) => {}
                    Err(e @ RmzError::DuplicateFlow(_)) => {
                        error!("Connect event rejected: {}", e);
                        report.duplicate_flows += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            ReplayEvent::Stream {
                flow,
                ip,
                direction,
                data,
                disconnect,
            } => {
                let mut flags = match direction {
                    Direction::Send => StreamFlags::SEND,
                    Direction::Receive => StreamFlags::RECEIVE,
                };
                if *disconnect {
                    flags |= match direction {
                        Direction::Send => StreamFlags::SEND_DISCONNECT,
                        Direction::Receive => StreamFlags::RECEIVE_DISCONNECT,
                    };
                }

                let payload = data.as_bytes();
                let mut out = ClassifyOut::default();
                classifier.classify_stream(
                    &IncomingValues {
                        layer: ip.stream_layer(),
                    },
                    Some(&StreamData::new(flags, payload)),
                    *flow,
                    &mut out,
                );

                debug!(
                    "Flow {} {:?} \"{}\" -> {:?}",
                    flow,
                    direction,
                    preview_payload(payload, 32),
                    out.action
                );

                if out.action == Action::Block {
                    report.stream_blocked += 1;
                } else {
                    report.stream_permitted += 1;
                }
            }
            ReplayEvent::Delete { flow, ip, callout } => {
                let callout_id = callout.unwrap_or(classifier.stream_callout_id());
                if classifier.flow_delete(ip.stream_layer(), callout_id, *flow) {
                    report.flows_deleted += 1;
                }
            }
            ReplayEvent::Filter { change, id } => {
                let kind = match change {
                    FilterChange::Add => NotifyType::AddFilter,
                    FilterChange::Delete => NotifyType::DeleteFilter,
                };
                classifier.notify(
                    kind,
                    &FilterInfo {
                        filter_id: *id,
                        ..Default::default()
                    },
                );
            }
            ReplayEvent::Sleep { ms } => {
                thread::sleep(Duration::from_millis(*ms));
            }
        }

        report.events += 1;
    }

    info!(
        "Replayed {} events: {} blocked, {} permitted, {} flows deleted",
        report.events, report.stream_blocked, report.stream_permitted, report.flows_deleted
    );
    Ok(report)
}
