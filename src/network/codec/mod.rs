//! Serialisation of queued packets for delivery to the consumer.

pub mod binary_writer;
pub mod record;

pub use binary_writer::BinaryWriter;
pub use record::{
    decode_record, encode_packet, encode_to_vec, encoded_len, Record, RecordReader,
    RECORD_HEADER_LEN,
};
