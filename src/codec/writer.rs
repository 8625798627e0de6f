// Encoding side of the stream codec

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::codec::varint;
use crate::codec::Endian;
use crate::error::{Error, Result};
use crate::utils::encoding;

const I24_MIN: i32 = -(1 << 23);
const I24_MAX: i32 = (1 << 23) - 1;
const U24_MAX: u32 = (1 << 24) - 1;

/// Endian-aware, bit-addressable writer over any byte sink.
///
/// Bits accumulate LSB-first in a pending byte. Any byte-granular write emits
/// that byte first, zero-padded. `flush` and `into_inner` do the same, but
/// dropping the writer does not.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    inner: W,
    endian: Endian,
    bit_byte: u8,
    bits_used: u8,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W, endian: Endian) -> Self {
        StreamWriter {
            inner,
            endian,
            bit_byte: 0,
            bits_used: 0,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Direct access to the sink. Pending bits are not flushed.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Flush pending bits and hand back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush_bits()?;
        Ok(self.inner)
    }

    /// Bits written into the pending byte so far (0..=7).
    pub fn pending_bits(&self) -> u8 {
        self.bits_used
    }

    /// Emit the pending partial byte, zero-padded. No-op when byte aligned.
    pub fn flush_bits(&mut self) -> Result<()> {
        if self.bits_used > 0 {
            self.inner.write_all(&[self.bit_byte])?;
            self.bit_byte = 0;
            self.bits_used = 0;
        }
        Ok(())
    }

    /// Flush pending bits, then the sink itself.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_bits()?;
        self.inner.flush()?;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn write_ordered<const N: usize, T>(
        &mut self,
        value: T,
        big: fn(&mut [u8], T),
        little: fn(&mut [u8], T),
    ) -> Result<()> {
        let mut buf = [0u8; N];
        match self.endian {
            Endian::Big => big(&mut buf, value),
            Endian::Little => little(&mut buf, value),
        }
        self.put(&buf)
    }

    // ---- raw bytes ----

    /// Write `bytes` as-is, with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put(bytes)
    }

    // ---- primitives ----

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.put(&[value as u8])
    }

    /// One byte, 1 or 0.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.put(&[u8::from(value)])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_ordered::<2, _>(value, BigEndian::write_u16, LittleEndian::write_u16)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_ordered::<2, _>(value, BigEndian::write_i16, LittleEndian::write_i16)
    }

    /// Three bytes; values above 0xFFFFFF are rejected.
    pub fn write_u24(&mut self, value: u32) -> Result<()> {
        if value > U24_MAX {
            return Err(Error::invalid_argument(format!(
                "Value does not fit in 24 bits: {:#x}",
                value
            )));
        }
        self.write_ordered::<3, _>(value, BigEndian::write_u24, LittleEndian::write_u24)
    }

    /// Three bytes, two's complement; values outside the 24-bit range are rejected.
    pub fn write_i24(&mut self, value: i32) -> Result<()> {
        if !(I24_MIN..=I24_MAX).contains(&value) {
            return Err(Error::invalid_argument(format!(
                "Value does not fit in 24 bits: {}",
                value
            )));
        }
        self.write_ordered::<3, _>(value, BigEndian::write_i24, LittleEndian::write_i24)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_ordered::<4, _>(value, BigEndian::write_u32, LittleEndian::write_u32)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_ordered::<4, _>(value, BigEndian::write_i32, LittleEndian::write_i32)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_ordered::<8, _>(value, BigEndian::write_u64, LittleEndian::write_u64)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_ordered::<8, _>(value, BigEndian::write_i64, LittleEndian::write_i64)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_ordered::<4, _>(value, BigEndian::write_f32, LittleEndian::write_f32)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_ordered::<8, _>(value, BigEndian::write_f64, LittleEndian::write_f64)
    }

    pub fn write_char(&mut self, unit: u16) -> Result<()> {
        self.write_u16(unit)
    }

    // ---- length-prefixed arrays ----

    fn write_array_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| Error::invalid_argument(format!("Array too long: {} elements", len)))?;
        self.write_i32(len)
    }

    /// Write the element count, then each element with `write_element`.
    pub fn write_array<T, F>(&mut self, items: &[T], mut write_element: F) -> Result<()>
    where
        F: FnMut(&mut Self, &T) -> Result<()>,
    {
        self.write_array_len(items.len())?;
        for item in items {
            write_element(self, item)?;
        }
        Ok(())
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_array_len(bytes.len())?;
        self.put(bytes)
    }

    pub fn write_i16_array(&mut self, values: &[i16]) -> Result<()> {
        self.write_array(values, |w, &v| w.write_i16(v))
    }

    pub fn write_i32_array(&mut self, values: &[i32]) -> Result<()> {
        self.write_array(values, |w, &v| w.write_i32(v))
    }

    pub fn write_i64_array(&mut self, values: &[i64]) -> Result<()> {
        self.write_array(values, |w, &v| w.write_i64(v))
    }

    pub fn write_f32_array(&mut self, values: &[f32]) -> Result<()> {
        self.write_array(values, |w, &v| w.write_f32(v))
    }

    pub fn write_f64_array(&mut self, values: &[f64]) -> Result<()> {
        self.write_array(values, |w, &v| w.write_f64(v))
    }

    pub fn write_char_array(&mut self, units: &[u16]) -> Result<()> {
        self.write_array(units, |w, &u| w.write_char(u))
    }

    pub fn write_string_array<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.write_array(values, |w, s| w.write_string(s.as_ref()))
    }

    pub fn write_i32_array_2d(&mut self, rows: &[Vec<i32>]) -> Result<()> {
        self.write_array(rows, |w, row| w.write_i32_array(row))
    }

    pub fn write_i32_array_3d(&mut self, planes: &[Vec<Vec<i32>>]) -> Result<()> {
        self.write_array(planes, |w, plane| w.write_i32_array_2d(plane))
    }

    pub fn write_i16_array_2d(&mut self, rows: &[Vec<i16>]) -> Result<()> {
        self.write_array(rows, |w, row| w.write_i16_array(row))
    }

    pub fn write_i16_array_3d(&mut self, planes: &[Vec<Vec<i16>>]) -> Result<()> {
        self.write_array(planes, |w, plane| w.write_i16_array_2d(plane))
    }

    /// Count, then the flags packed 32 to an i32 word.
    pub fn write_bool_array(&mut self, values: &[bool]) -> Result<()> {
        self.write_array_len(values.len())?;
        for chunk in values.chunks(32) {
            let word = chunk
                .iter()
                .enumerate()
                .filter(|(_, set)| **set)
                .fold(0u32, |word, (bit, _)| word | (1 << bit));
            self.write_u32(word)?;
        }
        Ok(())
    }

    // ---- strings ----

    /// Length-prefixed UTF-16 code units.
    pub fn write_string(&mut self, text: &str) -> Result<()> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.write_char_array(&units)
    }

    /// Length-prefixed bytes in the encoding named by `label`.
    pub fn write_string_encoded(&mut self, text: &str, label: &str) -> Result<()> {
        let bytes = encoding::encode_text(text, label)?;
        self.write_byte_array(&bytes)
    }

    /// Length-prefixed ASCII; non-ASCII characters become '?'.
    pub fn write_ascii_string(&mut self, text: &str) -> Result<()> {
        self.write_byte_array(&encoding::encode_ascii(text))
    }

    /// Raw ASCII bytes with no prefix.
    pub fn write_ascii(&mut self, text: &str) -> Result<()> {
        self.put(&encoding::encode_ascii(text))
    }

    /// Write `text` XORed with a random nonzero 15-bit key, key first.
    pub fn write_obfuscated_string(&mut self, text: &str) -> Result<()> {
        self.write_obfuscated_string_with_key(text, fastrand::i16(1..=0x7FFF))
    }

    /// As `write_obfuscated_string` with a caller-chosen key in 1..=0x7FFF.
    pub fn write_obfuscated_string_with_key(&mut self, text: &str, key: i16) -> Result<()> {
        if key <= 0 {
            return Err(Error::invalid_argument(format!(
                "Obfuscation key must be in 1..=0x7FFF, got {}",
                key
            )));
        }
        let units: Vec<u16> = text.encode_utf16().map(|unit| unit ^ key as u16).collect();
        self.write_i16(key)?;
        self.write_char_array(&units)
    }

    pub fn write_obfuscated_string_array<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.write_array(values, |w, s| w.write_obfuscated_string(s.as_ref()))
    }

    // ---- variable-length integers ----

    /// Variable-length int; 0..=0x0FFFFFFF, anything else is `InvalidArgument`.
    pub fn write_variable_length_int(&mut self, value: i32) -> Result<()> {
        let bytes = varint::encode_int(value)?;
        self.put(&bytes)
    }

    /// Variable-length long; negative values are `InvalidArgument`.
    pub fn write_variable_length_long(&mut self, value: i64) -> Result<()> {
        let bytes = varint::encode_long(value)?;
        self.put(&bytes)
    }

    // ---- bits ----

    /// Append one bit, least significant first within the byte.
    ///
    /// The bit cursor is reset before a completed byte goes to the sink, so a
    /// failed write loses that byte but leaves the writer usable.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        if bit {
            self.bit_byte |= 1 << self.bits_used;
        }
        self.bits_used += 1;
        if self.bits_used == 8 {
            let byte = std::mem::take(&mut self.bit_byte);
            self.bits_used = 0;
            self.inner.write_all(&[byte])?;
        }
        Ok(())
    }

    fn write_bits(&mut self, count: u32, value: u64) -> Result<()> {
        for index in 0..count {
            self.write_bit((value >> index) & 1 != 0)?;
        }
        Ok(())
    }

    /// Write the low `count` (0..=32) bits of `value`, lowest first.
    pub fn write_int_bits(&mut self, count: u32, value: u32) -> Result<()> {
        if count > 32 {
            return Err(Error::invalid_argument(format!(
                "Cannot write {} bits from an int",
                count
            )));
        }
        self.write_bits(count, u64::from(value))
    }

    /// Write the low `count` (0..=64) bits of `value`, lowest first.
    pub fn write_long_bits(&mut self, count: u32, value: u64) -> Result<()> {
        if count > 64 {
            return Err(Error::invalid_argument(format!(
                "Cannot write {} bits from a long",
                count
            )));
        }
        self.write_bits(count, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written<F>(endian: Endian, f: F) -> Vec<u8>
    where
        F: FnOnce(&mut StreamWriter<Vec<u8>>) -> Result<()>,
    {
        let mut w = StreamWriter::new(Vec::new(), endian);
        f(&mut w).unwrap();
        w.into_inner().unwrap()
    }

    #[test]
    fn test_write_int_both_endians() {
        assert_eq!(written(Endian::Big, |w| w.write_i32(0x0102_0304)), [1, 2, 3, 4]);
        assert_eq!(written(Endian::Little, |w| w.write_i32(0x0102_0304)), [4, 3, 2, 1]);
    }

    #[test]
    fn test_24_bit_range() {
        assert_eq!(written(Endian::Big, |w| w.write_i24(-2)), [0xFF, 0xFF, 0xFE]);
        let mut w = StreamWriter::new(Vec::new(), Endian::Big);
        assert!(matches!(w.write_u24(0x0100_0000), Err(Error::InvalidArgument(_))));
        assert!(matches!(w.write_i24(1 << 23), Err(Error::InvalidArgument(_))));
        assert!(w.get_ref().is_empty());
    }

    #[test]
    fn test_partial_byte_zero_padded_before_byte_write() {
        let bytes = written(Endian::Big, |w| {
            w.write_bit(true)?;
            w.write_bit(false)?;
            w.write_bit(true)?;
            w.write_u8(0xAB)
        });
        assert_eq!(bytes, [0b0000_0101, 0xAB]);
    }

    #[test]
    fn test_int_bits_value_and_count_not_swapped() {
        let bytes = written(Endian::Big, |w| w.write_int_bits(4, 0b1010));
        assert_eq!(bytes, [0b0000_1010]);
    }

    #[test]
    fn test_long_bits_full_width() {
        let bytes = written(Endian::Little, |w| w.write_long_bits(64, u64::MAX));
        assert_eq!(bytes, [0xFF; 8]);
    }

    #[test]
    fn test_bit_count_rejected_before_io() {
        let mut w = StreamWriter::new(Vec::new(), Endian::Big);
        assert!(matches!(w.write_int_bits(33, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(w.write_long_bits(65, 1), Err(Error::InvalidArgument(_))));
        assert_eq!(w.pending_bits(), 0);
    }

    /// Sink that rejects its first write
    struct FailOnce {
        failed: bool,
        bytes: Vec<u8>,
    }

    impl Write for FailOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::other("sink full"));
            }
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_bit_writer_usable_after_sink_error() {
        let mut w = StreamWriter::new(FailOnce { failed: false, bytes: Vec::new() }, Endian::Big);
        for _ in 0..7 {
            w.write_bit(true).unwrap();
        }
        assert!(matches!(w.write_bit(true), Err(Error::Io(_))));
        assert_eq!(w.pending_bits(), 0);

        w.write_int_bits(8, 0xA5).unwrap();
        w.write_bit(true).unwrap();
        assert_eq!(w.into_inner().unwrap().bytes, [0xA5, 0x01]);
    }

    #[test]
    fn test_flush_bits_is_idempotent() {
        let mut w = StreamWriter::new(Vec::new(), Endian::Big);
        w.write_bit(true).unwrap();
        w.flush_bits().unwrap();
        w.flush_bits().unwrap();
        assert_eq!(w.get_ref(), &vec![0x01]);
    }

    #[test]
    fn test_byte_array_prefix() {
        let bytes = written(Endian::Big, |w| w.write_byte_array(b"abc"));
        assert_eq!(bytes, [0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_string_is_utf16_units() {
        let bytes = written(Endian::Little, |w| w.write_string("Hé"));
        assert_eq!(bytes, [2, 0, 0, 0, 0x48, 0x00, 0xE9, 0x00]);
    }

    #[test]
    fn test_ascii_raw_and_prefixed() {
        assert_eq!(written(Endian::Big, |w| w.write_ascii("RIFF")), b"RIFF");
        assert_eq!(
            written(Endian::Big, |w| w.write_ascii_string("ok")),
            [0, 0, 0, 2, b'o', b'k']
        );
    }

    #[test]
    fn test_obfuscated_key_range() {
        for _ in 0..64 {
            let bytes = written(Endian::Big, |w| w.write_obfuscated_string("x"));
            let key = i16::from_be_bytes([bytes[0], bytes[1]]);
            assert!((1..=0x7FFF).contains(&key));
            assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), u16::from(b'x') ^ key as u16);
        }
        let mut w = StreamWriter::new(Vec::new(), Endian::Big);
        assert!(matches!(
            w.write_obfuscated_string_with_key("x", 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bool_array_packs_words() {
        let mut flags = vec![false; 33];
        flags[0] = true;
        flags[32] = true;
        let bytes = written(Endian::Little, |w| w.write_bool_array(&flags));
        assert_eq!(bytes, [33, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_varint_rejects_out_of_range() {
        let mut w = StreamWriter::new(Vec::new(), Endian::Big);
        assert!(matches!(w.write_variable_length_int(-1), Err(Error::InvalidArgument(_))));
        assert!(w.get_ref().is_empty());
        assert_eq!(written(Endian::Little, |w| w.write_variable_length_int(300)), [0x82, 0x2C]);
    }
}
