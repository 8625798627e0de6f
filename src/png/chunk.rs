use std::fmt;

use serde::Serialize;

use crate::container::{ByteSerializable, ContainerChunk};
use crate::error::{Error, Result};
use crate::utils::encoding::decode_ascii;

/// Bit 5 of each type byte; set means lowercase
const CASE_BIT: u8 = 0x20;

/// Four-byte chunk type such as `IHDR` or `tEXt`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType([u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const IDAT: ChunkType = ChunkType(*b"IDAT");
    pub const IEND: ChunkType = ChunkType(*b"IEND");

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        ChunkType(bytes)
    }

    /// Parse a chunk name; surrounding whitespace is ignored but what is left
    /// must be exactly four ASCII characters.
    pub fn from_name(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let bytes: [u8; 4] = trimmed
            .as_bytes()
            .try_into()
            .ok()
            .filter(|b: &[u8; 4]| b.is_ascii())
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Chunk name must be 4 ASCII characters: {:?}",
                    name
                ))
            })?;
        Ok(ChunkType(bytes))
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Lowercase first letter: not needed to display the image
    pub fn is_ancillary(&self) -> bool {
        self.flag(0)
    }

    /// Lowercase second letter: not a registered public chunk
    pub fn is_private(&self) -> bool {
        self.flag(1)
    }

    /// Lowercase third letter: reserved, invalid in current PNG
    pub fn is_reserved(&self) -> bool {
        self.flag(2)
    }

    /// Lowercase fourth letter: editors may copy it without understanding it
    pub fn is_safe_to_copy(&self) -> bool {
        self.flag(3)
    }

    fn flag(&self, position: usize) -> bool {
        self.0[position] & CASE_BIT != 0
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", decode_ascii(&self.0))
    }
}

impl Serialize for ChunkType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One PNG chunk: length, type, data, CRC32 over type and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngChunk {
    chunk_type: ChunkType,
    data: Vec<u8>,
    crc: u32,
}

impl PngChunk {
    /// Build a chunk to write; the CRC is computed here.
    pub fn new(name: &str, data: Vec<u8>) -> Result<Self> {
        let chunk_type = ChunkType::from_name(name)?;
        Self::with_type(chunk_type, data)
    }

    pub fn with_type(chunk_type: ChunkType, data: Vec<u8>) -> Result<Self> {
        if u32::try_from(data.len()).map_or(true, |len| len > i32::MAX as u32) {
            return Err(Error::invalid_argument(format!(
                "Chunk data too large: {} bytes",
                data.len()
            )));
        }
        let crc = compute_crc(&chunk_type, &data);
        Ok(PngChunk {
            chunk_type,
            data,
            crc,
        })
    }

    /// A chunk as stored in a file, CRC taken verbatim.
    pub(crate) fn from_parts(chunk_type: ChunkType, data: Vec<u8>, crc: u32) -> Self {
        PngChunk {
            chunk_type,
            data,
            crc,
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn name(&self) -> String {
        self.chunk_type.to_string()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Value of the length field
    pub fn length(&self) -> u32 {
        self.data.len() as u32
    }

    /// The stored CRC (as read, or as computed by `new`)
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// CRC32 recomputed over type and data
    pub fn computed_crc(&self) -> u32 {
        compute_crc(&self.chunk_type, &self.data)
    }

    pub fn crc_matches(&self) -> bool {
        self.crc == self.computed_crc()
    }

    pub fn is_ancillary(&self) -> bool {
        self.chunk_type.is_ancillary()
    }

    pub fn is_private(&self) -> bool {
        self.chunk_type.is_private()
    }

    pub fn is_reserved(&self) -> bool {
        self.chunk_type.is_reserved()
    }

    pub fn is_safe_to_copy(&self) -> bool {
        self.chunk_type.is_safe_to_copy()
    }
}

fn compute_crc(chunk_type: &ChunkType, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&chunk_type.0);
    hasher.update(data);
    hasher.finalize()
}

impl ByteSerializable for PngChunk {
    /// Big-endian length, type, data and a freshly computed CRC.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.data.len());
        out.extend_from_slice(&self.length().to_be_bytes());
        out.extend_from_slice(&self.chunk_type.0);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.computed_crc().to_be_bytes());
        out
    }
}

impl ContainerChunk for PngChunk {
    fn payload(&self) -> &[u8] {
        &self.data
    }
}
