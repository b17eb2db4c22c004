use std::fmt;
use std::time::Instant;

use crate::error::RmzError;

/// Where in the connection lifecycle a packet originated.
///
/// The discriminants are the values written to the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketSource {
    NewConnection = 0,
    FromServer = 1,
    FromClient = 2,
}

impl PacketSource {
    /// Returns the on-wire byte for this source.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketSource {
    type Error = RmzError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketSource::NewConnection),
            1 => Ok(PacketSource::FromServer),
            2 => Ok(PacketSource::FromClient),
            other => Err(RmzError::MalformedRecord(format!(
                "unknown packet source {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PacketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketSource::NewConnection => "new-connection",
            PacketSource::FromServer => "from-server",
            PacketSource::FromClient => "from-client",
        };
        f.write_str(name)
    }
}

/// One quantum of intercepted stream data.
///
/// The payload is an owned copy; the network stack's buffer is never
/// retained past the classify call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Owning flow
    pub flow_id: u64,

    /// Queue sequence number, assigned at enqueue time
    pub serial: u64,

    /// Direction / lifecycle stage of the data
    pub source: PacketSource,

    /// Durable copy of the stream bytes
    pub payload: Vec<u8>,

    /// When the packet was queued
    pub arrival_time: Instant,
}

impl Packet {
    pub fn new(flow_id: u64, serial: u64, source: PacketSource, payload: Vec<u8>) -> Self {
        Packet {
            flow_id,
            serial,
            source,
            payload,
            arrival_time: Instant::now(),
        }
    }

    /// Returns the size of the payload in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Returns the time elapsed since the packet was queued
    pub fn age(&self) -> std::time::Duration {
        self.arrival_time.elapsed()
    }
}
