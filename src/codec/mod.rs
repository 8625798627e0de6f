// Endian-aware, bit-addressable byte stream codec
//
// Wire conventions shared by StreamReader and StreamWriter:
// - Multi-byte numbers follow the stream's Endian mode
// - Arrays: i32 element count (stream endian), then the elements
// - Strings: i32 count of UTF-16 code units, then the units as u16
// - Variable-length integers: 7-bit groups, most significant first, 0x80 on
//   every byte but the last; always big-endian
// - Bits: least significant bit of a byte first

pub mod reader;
pub mod varint;
pub mod writer;

pub use reader::StreamReader;
pub use writer::StreamWriter;

use serde::Serialize;

/// Byte order used for multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Most significant byte first (Motorola)
    Big,
    /// Least significant byte first (Intel)
    Little,
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endian::Big => write!(f, "big-endian"),
            Endian::Little => write!(f, "little-endian"),
        }
    }
}

/// Length prefixes are read as i32; anything beyond this many elements is
/// reserved lazily so a corrupt prefix cannot force a huge allocation.
pub(crate) const MAX_PREALLOCATION: usize = 64 * 1024;
