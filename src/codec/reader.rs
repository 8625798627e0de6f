// Decoding side of the stream codec

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::trace;

use crate::codec::varint::{self, MAX_INT_BYTES, MAX_LONG_BYTES};
use crate::codec::{Endian, MAX_PREALLOCATION};
use crate::error::{Error, Result};
use crate::utils::encoding;
use crate::utils::io::read_up_to;

/// Endian-aware, bit-addressable reader over any byte source.
///
/// Byte-granular reads drop whatever is left of a partially consumed bit byte
/// before touching the source. Reading a single byte at a time from an
/// unbuffered file is slow; wrap such sources in a `BufReader`.
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
    endian: Endian,
    bit_byte: u8,
    bits_left: u8,
}

impl<R: Read> StreamReader<R> {
    /// Wrap `inner`, decoding multi-byte values in `endian` order.
    pub fn new(inner: R, endian: Endian) -> Self {
        StreamReader {
            inner,
            endian,
            bit_byte: 0,
            bits_left: 0,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Switch byte order for subsequent reads.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Discard the unread bits of the current bit byte.
    pub fn byte_align(&mut self) {
        self.bits_left = 0;
    }

    /// Bits still buffered from the last partially consumed byte.
    pub fn pending_bits(&self) -> u8 {
        self.bits_left
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.byte_align();
        self.fill_unaligned(buf)
    }

    fn fill_unaligned(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match read_up_to(&mut self.inner, buf)? {
            0 => Err(Error::EndOfStream),
            got if got < buf.len() => Err(Error::Truncated {
                needed: buf.len(),
                got,
            }),
            _ => Ok(()),
        }
    }

    fn read_ordered<const N: usize, T>(
        &mut self,
        big: fn(&[u8]) -> T,
        little: fn(&[u8]) -> T,
    ) -> Result<T> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(match self.endian {
            Endian::Big => big(&buf),
            Endian::Little => little(&buf),
        })
    }

    // ---- raw bytes ----

    /// Read as many bytes as are available up to `buf.len()`.
    ///
    /// Returns 0 only at end of stream (or for an empty buffer).
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.byte_align();
        Ok(read_up_to(&mut self.inner, buf)?)
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.byte_align();
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        let got = (&mut self.inner).take(len as u64).read_to_end(&mut out)?;
        match got {
            0 => Err(Error::EndOfStream),
            got if got < len => Err(Error::Truncated { needed: len, got }),
            _ => Ok(out),
        }
    }

    // ---- primitives ----

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// One byte; anything nonzero is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_ordered::<2, _>(BigEndian::read_u16, LittleEndian::read_u16)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_ordered::<2, _>(BigEndian::read_i16, LittleEndian::read_i16)
    }

    /// Three bytes, zero-extended.
    pub fn read_u24(&mut self) -> Result<u32> {
        self.read_ordered::<3, _>(BigEndian::read_u24, LittleEndian::read_u24)
    }

    /// Three bytes, sign-extended from bit 23.
    pub fn read_i24(&mut self) -> Result<i32> {
        self.read_ordered::<3, _>(BigEndian::read_i24, LittleEndian::read_i24)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_ordered::<4, _>(BigEndian::read_u32, LittleEndian::read_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_ordered::<4, _>(BigEndian::read_i32, LittleEndian::read_i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_ordered::<8, _>(BigEndian::read_u64, LittleEndian::read_u64)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_ordered::<8, _>(BigEndian::read_i64, LittleEndian::read_i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_ordered::<4, _>(BigEndian::read_f32, LittleEndian::read_f32)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_ordered::<8, _>(BigEndian::read_f64, LittleEndian::read_f64)
    }

    /// One UTF-16 code unit.
    pub fn read_char(&mut self) -> Result<u16> {
        self.read_u16()
    }

    // ---- length-prefixed arrays ----

    fn read_array_len(&mut self) -> Result<usize> {
        let len = self.read_i32()?;
        usize::try_from(len)
            .map_err(|_| Error::invalid_data(format!("Negative array length: {}", len)))
    }

    /// Read an i32 element count, then that many elements with `read_element`.
    ///
    /// End of stream before the count is `EndOfStream`; anywhere after it the
    /// array is `Truncated`, counted in elements.
    pub fn read_array<T, F>(&mut self, mut read_element: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let len = self.read_array_len()?;
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        for index in 0..len {
            let element = read_element(self).map_err(|e| match e {
                Error::EndOfStream => Error::Truncated { needed: len, got: index },
                other => other,
            })?;
            out.push(element);
        }
        Ok(out)
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_array_len()?;
        self.read_bytes(len).map_err(|e| e.into_truncated(len))
    }

    pub fn read_i16_array(&mut self) -> Result<Vec<i16>> {
        self.read_array(Self::read_i16)
    }

    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        self.read_array(Self::read_i32)
    }

    pub fn read_i64_array(&mut self) -> Result<Vec<i64>> {
        self.read_array(Self::read_i64)
    }

    pub fn read_f32_array(&mut self) -> Result<Vec<f32>> {
        self.read_array(Self::read_f32)
    }

    pub fn read_f64_array(&mut self) -> Result<Vec<f64>> {
        self.read_array(Self::read_f64)
    }

    pub fn read_char_array(&mut self) -> Result<Vec<u16>> {
        self.read_array(Self::read_char)
    }

    pub fn read_string_array(&mut self) -> Result<Vec<String>> {
        self.read_array(Self::read_string)
    }

    pub fn read_i32_array_2d(&mut self) -> Result<Vec<Vec<i32>>> {
        self.read_array(Self::read_i32_array)
    }

    pub fn read_i32_array_3d(&mut self) -> Result<Vec<Vec<Vec<i32>>>> {
        self.read_array(Self::read_i32_array_2d)
    }

    pub fn read_i16_array_2d(&mut self) -> Result<Vec<Vec<i16>>> {
        self.read_array(Self::read_i16_array)
    }

    pub fn read_i16_array_3d(&mut self) -> Result<Vec<Vec<Vec<i16>>>> {
        self.read_array(Self::read_i16_array_2d)
    }

    /// Packed booleans: count, then one i32 word per 32 flags, flag `i` in
    /// bit `i % 32` of word `i / 32`.
    pub fn read_bool_array(&mut self) -> Result<Vec<bool>> {
        let len = self.read_array_len()?;
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        let mut word = 0u32;
        for index in 0..len {
            if index % 32 == 0 {
                word = self.read_u32().map_err(|e| match e {
                    Error::EndOfStream => Error::Truncated { needed: len, got: index },
                    other => other,
                })?;
            }
            out.push(word & (1 << (index % 32)) != 0);
        }
        Ok(out)
    }

    // ---- fixed-count reads ----

    fn read_repeated<T, F>(&mut self, count: usize, mut read_element: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let mut out = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for index in 0..count {
            let element = read_element(self).map_err(|e| match e {
                Error::EndOfStream if index > 0 => Error::Truncated { needed: count, got: index },
                other => other,
            })?;
            out.push(element);
        }
        Ok(out)
    }

    /// `count` i16 values with no length prefix.
    pub fn read_i16s(&mut self, count: usize) -> Result<Vec<i16>> {
        self.read_repeated(count, Self::read_i16)
    }

    pub fn read_i32s(&mut self, count: usize) -> Result<Vec<i32>> {
        self.read_repeated(count, Self::read_i32)
    }

    pub fn read_i64s(&mut self, count: usize) -> Result<Vec<i64>> {
        self.read_repeated(count, Self::read_i64)
    }

    pub fn read_f32s(&mut self, count: usize) -> Result<Vec<f32>> {
        self.read_repeated(count, Self::read_f32)
    }

    pub fn read_f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        self.read_repeated(count, Self::read_f64)
    }

    pub fn read_chars(&mut self, count: usize) -> Result<Vec<u16>> {
        self.read_repeated(count, Self::read_char)
    }

    // ---- strings ----

    /// Length-prefixed UTF-16 code units.
    pub fn read_string(&mut self) -> Result<String> {
        let units = self.read_char_array()?;
        String::from_utf16(&units).map_err(|e| Error::invalid_data(e.to_string()))
    }

    /// Length-prefixed bytes decoded with the encoding named by `label`.
    pub fn read_string_encoded(&mut self, label: &str) -> Result<String> {
        let encoding = encoding::lookup(label)?;
        let bytes = self.read_byte_array()?;
        let (text, _had_errors) = encoding.decode_without_bom_handling(&bytes);
        Ok(text.into_owned())
    }

    /// Length-prefixed ASCII bytes.
    pub fn read_ascii_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_array()?;
        Ok(encoding::decode_ascii(&bytes))
    }

    /// Exactly `len` ASCII bytes, no prefix.
    pub fn read_ascii(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(encoding::decode_ascii(&bytes))
    }

    /// An i16 key followed by a UTF-16 array XORed with it.
    pub fn read_obfuscated_string(&mut self) -> Result<String> {
        let key = self.read_i16()? as u16;
        let units: Vec<u16> = self
            .read_char_array()
            .map_err(|e| e.into_truncated(1))?
            .into_iter()
            .map(|unit| unit ^ key)
            .collect();
        String::from_utf16(&units).map_err(|e| Error::invalid_data(e.to_string()))
    }

    pub fn read_obfuscated_string_array(&mut self) -> Result<Vec<String>> {
        self.read_array(Self::read_obfuscated_string)
    }

    // ---- variable-length integers ----

    fn read_varint(&mut self, max_bytes: usize) -> Result<u64> {
        varint::decode_with(max_bytes, |index| {
            self.read_u8().map_err(|e| match e {
                Error::EndOfStream if index > 0 => Error::Truncated {
                    needed: index + 1,
                    got: index,
                },
                other => other,
            })
        })
    }

    /// Variable-length int (up to 4 bytes, 28 bits).
    pub fn read_variable_length_int(&mut self) -> Result<i32> {
        Ok(self.read_varint(MAX_INT_BYTES)? as i32)
    }

    /// Variable-length long (up to 9 bytes, 63 bits).
    pub fn read_variable_length_long(&mut self) -> Result<i64> {
        let value = self.read_varint(MAX_LONG_BYTES)?;
        i64::try_from(value).map_err(|_| Error::invalid_data("Variable-length long exceeds 63 bits"))
    }

    // ---- bits ----

    /// Next bit, least significant first within each byte.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            let mut buf = [0u8; 1];
            self.fill_unaligned(&mut buf)?;
            self.bit_byte = buf[0];
            self.bits_left = 8;
        }
        let bit = (self.bit_byte >> (8 - self.bits_left)) & 1;
        self.bits_left -= 1;
        Ok(bit != 0)
    }

    fn read_bits(&mut self, count: u32) -> Result<u64> {
        let mut value = 0u64;
        for index in 0..count {
            let bit = self.read_bit().map_err(|e| match e {
                Error::EndOfStream if index > 0 => Error::Truncated {
                    needed: count as usize,
                    got: index as usize,
                },
                other => other,
            })?;
            if bit {
                value |= 1u64 << index;
            }
        }
        Ok(value)
    }

    /// Read `count` (0..=32) bits; bit `i` of the result is the `i`-th bit read.
    pub fn read_int_bits(&mut self, count: u32) -> Result<u32> {
        if count > 32 {
            return Err(Error::invalid_argument(format!(
                "Cannot read {} bits into an int",
                count
            )));
        }
        Ok(self.read_bits(count)? as u32)
    }

    /// Read `count` (0..=64) bits; bit `i` of the result is the `i`-th bit read.
    pub fn read_long_bits(&mut self, count: u32) -> Result<u64> {
        if count > 64 {
            return Err(Error::invalid_argument(format!(
                "Cannot read {} bits into a long",
                count
            )));
        }
        self.read_bits(count)
    }

    // ---- scanning ----

    /// Consume bytes until `pattern` has just been read.
    ///
    /// Returns `false` only when the stream ends first. On a mismatch the
    /// partial match falls back to its longest proper border, so patterns
    /// that overlap themselves are still found.
    pub fn seek_to_pattern(&mut self, pattern: &[u8]) -> Result<bool> {
        if pattern.is_empty() {
            return Ok(true);
        }
        let borders = pattern_borders(pattern);
        let mut matched = 0;
        let mut consumed = 0usize;
        while matched < pattern.len() {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(Error::EndOfStream) => {
                    trace!(consumed, "stream ended before pattern");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };
            consumed += 1;
            while matched > 0 && byte != pattern[matched] {
                matched = borders[matched - 1];
            }
            if byte == pattern[matched] {
                matched += 1;
            }
        }
        if consumed > pattern.len() {
            trace!(skipped = consumed - pattern.len(), "skipped bytes before pattern");
        }
        Ok(true)
    }

    /// Read `pattern.len()` bytes and report whether they equal `pattern`.
    pub fn read_for(&mut self, pattern: &[u8]) -> Result<bool> {
        let bytes = self.read_bytes(pattern.len())?;
        Ok(bytes == pattern)
    }
}

/// Length of the longest proper prefix of `pattern[..=i]` that is also its suffix
fn pattern_borders(pattern: &[u8]) -> Vec<usize> {
    let mut borders = vec![0; pattern.len()];
    let mut len = 0;
    for i in 1..pattern.len() {
        while len > 0 && pattern[i] != pattern[len] {
            len = borders[len - 1];
        }
        if pattern[i] == pattern[len] {
            len += 1;
        }
        borders[i] = len;
    }
    borders
}

impl<R: Read + Seek> StreamReader<R> {
    /// Reposition the source; buffered bits are dropped.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.byte_align();
        Ok(self.inner.seek(pos)?)
    }

    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Skip `len` bytes forward.
    pub fn skip(&mut self, len: u64) -> Result<u64> {
        let offset = i64::try_from(len)
            .map_err(|_| Error::invalid_argument(format!("Skip too large: {}", len)))?;
        self.seek(SeekFrom::Current(offset))
    }
}
