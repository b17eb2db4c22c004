//! Packet record wire format.
//!
//! Each record is laid out as:
//!
//! | field          | type  |
//! |----------------|-------|
//! | flow_id        | u64   |
//! | serial         | u64   |
//! | source         | u8    |
//! | payload_length | u64   |
//! | payload        | bytes |
//!
//! All integers are little-endian. Encoding is two-pass: size the buffer
//! with [`encoded_len`], then fill it with [`encode_packet`].

use crate::error::{Result, RmzError};
use crate::network::codec::binary_writer::BinaryWriter;
use crate::network::core::{Packet, PacketSource};

/// Size of the fixed part of a record.
pub const RECORD_HEADER_LEN: usize = 8 + 8 + 1 + 8;

/// Exact number of bytes [`encode_packet`] writes for `packet`.
pub fn encoded_len(packet: &Packet) -> usize {
    RECORD_HEADER_LEN + packet.payload.len()
}

/// Writes one record into `buffer`.
///
/// # Returns
///
/// * `Ok(usize)` - Bytes written
/// * `Err(RmzError::BufferOverflow)` - If `buffer` is smaller than [`encoded_len`]
pub fn encode_packet(packet: &Packet, buffer: &mut [u8]) -> Result<usize> {
    let needed = encoded_len(packet);
    if buffer.len() < needed {
        return Err(RmzError::BufferOverflow {
            needed,
            remaining: buffer.len(),
        });
    }

    let mut writer = BinaryWriter::new(buffer);
    writer.write_u64(packet.flow_id)?;
    writer.write_u64(packet.serial)?;
    writer.write_u8(packet.source.as_u8())?;
    writer.write_u64(packet.payload.len() as u64)?;
    writer.write_buffer(&packet.payload)?;
    Ok(writer.position())
}

/// Encodes a packet into a freshly allocated, exactly sized buffer.
pub fn encode_to_vec(packet: &Packet) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(encoded_len(packet))
        .map_err(|_| RmzError::allocation("encoded record"))?;
    buffer.resize(encoded_len(packet), 0);

    encode_packet(packet, &mut buffer)?;
    Ok(buffer)
}

/// A record as read back from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub flow_id: u64,
    pub serial: u64,
    pub source: PacketSource,
    pub payload: Vec<u8>,
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Decodes the record at the start of `bytes`.
///
/// # Returns
///
/// * `Ok((Record, usize))` - The record and the number of bytes it occupied
/// * `Err(RmzError::MalformedRecord)` - On truncation or an unknown source byte
pub fn decode_record(bytes: &[u8]) -> Result<(Record, usize)> {
    if bytes.len() < RECORD_HEADER_LEN {
        return Err(RmzError::MalformedRecord(format!(
            "need {} header bytes, have {}",
            RECORD_HEADER_LEN,
            bytes.len()
        )));
    }

    let flow_id = read_u64(bytes, 0);
    let serial = read_u64(bytes, 8);
    let source = PacketSource::try_from(bytes[16])?;
    let payload_len = read_u64(bytes, 17);

    let available = (bytes.len() - RECORD_HEADER_LEN) as u64;
    if payload_len > available {
        return Err(RmzError::MalformedRecord(format!(
            "payload of {} bytes truncated to {}",
            payload_len, available
        )));
    }

    let end = RECORD_HEADER_LEN + payload_len as usize;
    let record = Record {
        flow_id,
        serial,
        source,
        payload: bytes[RECORD_HEADER_LEN..end].to_vec(),
    };
    Ok((record, end))
}

/// Iterates over consecutive records in a byte stream.
///
/// Stops after the first malformed record, yielding its error.
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    failed: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        RecordReader {
            bytes,
            failed: false,
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.bytes.is_empty() {
            return None;
        }

        match decode_record(self.bytes) {
            Ok((record, consumed)) => {
                self.bytes = &self.bytes[consumed..];
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
