// Variable-length integer encoding
//
// 7 bits per byte, most significant group first, high bit set on every byte
// except the last. The int form carries 28 bits in at most 4 bytes, the long
// form 63 bits in at most 9 bytes. Zero is a single 0x00 byte.

use crate::error::{Error, Result};

/// Largest value accepted by the int form
pub const MAX_INT: i32 = 0x0FFF_FFFF;
/// Largest value accepted by the long form
pub const MAX_LONG: i64 = i64::MAX;

/// Maximum encoded size of the int form
pub const MAX_INT_BYTES: usize = 4;
/// Maximum encoded size of the long form
pub const MAX_LONG_BYTES: usize = 9;

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u8 = 0x7F;

/// Encode an int (0..=0x0FFFFFFF).
pub fn encode_int(value: i32) -> Result<Vec<u8>> {
    if !(0..=MAX_INT).contains(&value) {
        return Err(Error::invalid_argument(format!(
            "Variable-length int out of range: {:#x}",
            value
        )));
    }
    Ok(encode_groups(value as u64))
}

/// Encode a long (0..=i64::MAX).
pub fn encode_long(value: i64) -> Result<Vec<u8>> {
    if value < 0 {
        return Err(Error::invalid_argument(format!(
            "Variable-length long out of range: {:#x}",
            value
        )));
    }
    Ok(encode_groups(value as u64))
}

/// Number of bytes the encoding of `value` occupies.
pub fn encoded_len(value: u64) -> usize {
    let significant = 64 - value.leading_zeros() as usize;
    significant.div_ceil(7).max(1)
}

fn encode_groups(value: u64) -> Vec<u8> {
    let len = encoded_len(value);
    let mut out = vec![0u8; len];
    let mut rest = value;
    for (n, byte) in out.iter_mut().enumerate().rev() {
        *byte = (rest as u8) & GROUP_MASK;
        if n != len - 1 {
            *byte |= CONTINUATION;
        }
        rest >>= 7;
    }
    out
}

/// Decode one value pulling bytes from `next`, which receives the byte index.
///
/// The callback decides how exhaustion is reported, so stream readers can
/// distinguish a missing first byte from a missing continuation byte.
pub(crate) fn decode_with<F>(max_bytes: usize, mut next: F) -> Result<u64>
where
    F: FnMut(usize) -> Result<u8>,
{
    let mut value = 0u64;
    for index in 0..max_bytes {
        let byte = next(index)?;
        value = (value << 7) | u64::from(byte & GROUP_MASK);
        if byte & CONTINUATION == 0 {
            return Ok(value);
        }
    }
    Err(Error::invalid_data(format!(
        "Variable-length integer longer than {} bytes",
        max_bytes
    )))
}

fn decode_slice(bytes: &[u8], max_bytes: usize) -> Result<(u64, usize)> {
    let mut used = 0;
    let value = decode_with(max_bytes, |index| {
        used = index + 1;
        match bytes.get(index) {
            Some(&b) => Ok(b),
            None if index == 0 => Err(Error::EndOfStream),
            None => Err(Error::Truncated { needed: index + 1, got: index }),
        }
    })?;
    Ok((value, used))
}

/// Decode an int from the front of `bytes`, returning it and the bytes consumed.
pub fn decode_int(bytes: &[u8]) -> Result<(i32, usize)> {
    let (value, used) = decode_slice(bytes, MAX_INT_BYTES)?;
    Ok((value as i32, used))
}

/// Decode a long from the front of `bytes`, returning it and the bytes consumed.
pub fn decode_long(bytes: &[u8]) -> Result<(i64, usize)> {
    let (value, used) = decode_slice(bytes, MAX_LONG_BYTES)?;
    i64::try_from(value)
        .map(|v| (v, used))
        .map_err(|_| Error::invalid_data("Variable-length long exceeds 63 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_encodings() {
        assert_eq!(encode_int(0).unwrap(), vec![0x00]);
        assert_eq!(encode_int(127).unwrap(), vec![0x7F]);
        assert_eq!(encode_int(128).unwrap(), vec![0x81, 0x00]);
        assert_eq!(encode_int(16383).unwrap(), vec![0xFF, 0x7F]);
        assert_eq!(encode_int(MAX_INT).unwrap(), vec![0xFF, 0xFF, 0xFF, 0x7F]);
        assert_eq!(encode_long(MAX_LONG).unwrap().len(), MAX_LONG_BYTES);
    }

    #[test]
    fn test_300_sets_continuation_on_first_byte() {
        let bytes = encode_int(300).unwrap();
        assert_eq!(bytes, vec![0x82, 0x2C]);
        assert_ne!(bytes[0] & 0x80, 0);
        assert_eq!(decode_int(&bytes).unwrap(), (300, 2));
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(encode_int(-1), Err(Error::InvalidArgument(_))));
        assert!(matches!(encode_int(MAX_INT + 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(encode_long(-5), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_int(&[]), Err(Error::EndOfStream)));
        assert!(matches!(decode_int(&[0x81]), Err(Error::Truncated { .. })));
        assert!(matches!(
            decode_int(&[0x81, 0x81, 0x81, 0x81, 0x01]),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_long_roundtrip_max() {
        let bytes = encode_long(MAX_LONG).unwrap();
        assert_eq!(decode_long(&bytes).unwrap(), (MAX_LONG, MAX_LONG_BYTES));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(127), 1);
        assert_eq!(encoded_len(128), 2);
        assert_eq!(encoded_len(u64::MAX >> 1), 9);
    }
}
