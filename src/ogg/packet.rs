use std::io::Cursor;

use crate::codec::{Endian, StreamReader};
use crate::error::{Error, Result};
use crate::utils::encoding::decode_ascii;

/// Bit reader over one reassembled packet.
///
/// Little-endian, LSB-first, independent from the page stream. Reads are
/// clamped to the bits that are left; at the end of the packet they return
/// `None`.
#[derive(Debug)]
pub struct PacketReader {
    reader: StreamReader<Cursor<Vec<u8>>>,
    bits_left: usize,
}

impl PacketReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        let bits_left = bytes.len() * 8;
        PacketReader {
            reader: StreamReader::new(Cursor::new(bytes), Endian::Little),
            bits_left,
        }
    }

    /// The whole packet, regardless of how much has been read
    pub fn bytes(&self) -> &[u8] {
        self.reader.get_ref().get_ref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.reader.into_inner().into_inner()
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn bits_left(&self) -> usize {
        self.bits_left
    }

    pub fn has_bits_left(&self) -> bool {
        self.bits_left > 0
    }

    /// Read up to `count` (0..=32) bits; fewer if the packet is nearly done.
    pub fn read_bits(&mut self, count: u32) -> Result<Option<u32>> {
        if count > 32 {
            return Err(Error::invalid_argument(format!(
                "Cannot read {} bits from a packet at once",
                count
            )));
        }
        if self.bits_left == 0 {
            return Ok(None);
        }
        let count = count.min(self.bits_left as u32);
        let value = self.reader.read_int_bits(count)?;
        self.bits_left -= count as usize;
        Ok(Some(value))
    }

    pub fn read_bit(&mut self) -> Result<Option<bool>> {
        Ok(self.read_bits(1)?.map(|bit| bit != 0))
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.read_bits(8)?.map(|byte| byte as u8))
    }

    /// 32 bits that must all be present
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_exact_bits(32)
    }

    fn read_exact_bits(&mut self, count: u32) -> Result<u32> {
        let available = self.bits_left;
        match self.read_bits(count)? {
            None => Err(Error::EndOfStream),
            Some(_) if available < count as usize => Err(Error::Truncated {
                needed: count as usize,
                got: available,
            }),
            Some(value) => Ok(value),
        }
    }

    fn read_byte_run(&mut self, len: usize) -> Result<Vec<u8>> {
        if len.saturating_mul(8) > self.bits_left {
            return Err(Error::Truncated {
                needed: len,
                got: self.bits_left / 8,
            });
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_exact_bits(8)? as u8);
        }
        Ok(out)
    }

    /// `len` bytes decoded as UTF-8; malformed sequences become U+FFFD.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_byte_run(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// A 32-bit length, then that many ASCII bytes.
    pub fn read_string_vector(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_byte_run(len)?;
        Ok(decode_ascii(&bytes))
    }

    /// Read `pattern.len()` bytes and compare.
    pub fn read_for(&mut self, pattern: &[u8]) -> Result<bool> {
        let bytes = self.read_byte_run(pattern.len())?;
        Ok(bytes == pattern)
    }
}
