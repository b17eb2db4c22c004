use crate::error::{Result, RmzError};

/// Bounds-checked little-endian writer over a caller-supplied buffer.
///
/// The buffer is sized up front by the caller; the writer never grows it.
/// A write that does not fit leaves both the buffer and the cursor untouched
/// and returns [`RmzError::BufferOverflow`].
#[derive(Debug)]
pub struct BinaryWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> BinaryWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        BinaryWriter {
            buffer,
            position: 0,
        }
    }

    /// Current write offset.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_buffer(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_buffer(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_buffer(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_buffer(&value.to_le_bytes())
    }

    /// Copies `source` at the cursor and advances by its length.
    pub fn write_buffer(&mut self, source: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if source.len() > remaining {
            return Err(RmzError::BufferOverflow {
                needed: source.len(),
                remaining,
            });
        }

        let end = self.position + source.len();
        self.buffer[self.position..end].copy_from_slice(source);
        self.position = end;
        Ok(())
    }
}
