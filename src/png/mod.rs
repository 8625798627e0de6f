// PNG chunk reading and writing

mod chunk;

pub use chunk::{ChunkType, PngChunk};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::codec::{Endian, StreamReader};
use crate::container::{
    ByteSerializable, Chunks, ContainerFormat, ContainerHeader, ContainerReader, ContainerWriter,
};
use crate::error::{Error, Result};
use crate::utils::io::create_file;

/// PNG file signature
pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// The fixed 8-byte PNG file header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PngSignature;

impl ByteSerializable for PngSignature {
    fn to_bytes(&self) -> Vec<u8> {
        PNG_SIGNATURE.to_vec()
    }
}

impl ContainerHeader for PngSignature {}

/// Container hooks for PNG
pub struct PngFormat;

impl ContainerFormat for PngFormat {
    type Header = PngSignature;
    type Chunk = PngChunk;
    const ENDIAN: Endian = Endian::Big;

    fn read_header<R: Read>(reader: &mut StreamReader<R>) -> Result<PngSignature> {
        match reader.read_for(PNG_SIGNATURE) {
            Ok(true) => Ok(PngSignature),
            Ok(false) | Err(Error::EndOfStream) | Err(Error::Truncated { .. }) => {
                Err(Error::format("Not a PNG file"))
            }
            Err(e) => Err(e),
        }
    }

    fn read_chunk<R: Read>(reader: &mut StreamReader<R>, _: &PngSignature) -> Result<PngChunk> {
        let length = reader.read_u32()?;
        if length > i32::MAX as u32 {
            return Err(Error::invalid_data(format!("PNG chunk length too large: {}", length)));
        }
        let length = length as usize;

        let mut raw_type = [0u8; 4];
        let type_bytes = reader.read_bytes(4).map_err(|e| e.into_truncated(4))?;
        raw_type.copy_from_slice(&type_bytes);
        let chunk_type = ChunkType::from_bytes(raw_type);

        let data = reader.read_bytes(length).map_err(|e| e.into_truncated(length))?;
        let crc = reader.read_u32().map_err(|e| e.into_truncated(4))?;

        debug!(chunk = %chunk_type, length, crc, "read PNG chunk");
        Ok(PngChunk::from_parts(chunk_type, data, crc))
    }
}

/// Reads PNG chunks in file order
///
/// The signature is checked at construction. CRCs are not verified; use
/// `PngChunk::crc_matches` for that.
pub struct PngReader<R: Read> {
    inner: ContainerReader<PngFormat, R>,
}

impl PngReader<BufReader<File>> {
    /// Open a PNG file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> PngReader<R> {
    pub fn new(source: R) -> Result<Self> {
        Ok(PngReader {
            inner: ContainerReader::new(source)?,
        })
    }

    /// Next chunk, or `None` once the stream is exhausted
    pub fn next_chunk(&mut self) -> Result<Option<PngChunk>> {
        self.inner.next_chunk()
    }

    pub fn chunks(&mut self) -> Chunks<'_, PngFormat, R> {
        self.inner.chunks()
    }

    pub fn chunks_read(&self) -> usize {
        self.inner.chunks_read()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

/// Writes PNG chunks, emitting the signature before the first one
pub struct PngWriter<W: Write> {
    inner: ContainerWriter<PngSignature, W>,
}

impl PngWriter<BufWriter<File>> {
    /// Create (or truncate) a PNG file, making parent directories as needed
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = create_file(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PngWriter<W> {
    pub fn new(sink: W) -> Self {
        PngWriter {
            inner: ContainerWriter::new(sink, PngSignature, PngFormat::ENDIAN),
        }
    }

    pub fn write_chunk(&mut self, chunk: &PngChunk) -> Result<()> {
        debug!(chunk = %chunk.chunk_type(), length = chunk.length(), "writing PNG chunk");
        self.inner.write_chunk(chunk)
    }

    /// Build and write a chunk; a bad name fails before anything is written.
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let chunk = PngChunk::new(name, data.to_vec())?;
        self.write_chunk(&chunk)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    /// Flush and hand back the sink; an empty file still gets its signature.
    pub fn finish(self) -> Result<W> {
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_rejects_bad_signature() {
        assert!(matches!(
            PngReader::new(Cursor::new(b"GIF89a..".to_vec())),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            PngReader::new(Cursor::new(b"\x89PN".to_vec())),
            Err(Error::FormatMismatch(_))
        ));
        assert!(matches!(
            PngReader::new(Cursor::new(Vec::new())),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_writer_then_reader() {
        let mut w = PngWriter::new(Vec::new());
        w.write("IHDR", &[0u8; 13]).unwrap();
        w.write("IEND", &[]).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(&bytes[..8], PNG_SIGNATURE);

        let mut r = PngReader::new(Cursor::new(bytes)).unwrap();
        let ihdr = r.next_chunk().unwrap().unwrap();
        assert_eq!(ihdr.chunk_type(), ChunkType::IHDR);
        assert_eq!(ihdr.length(), 13);
        assert!(ihdr.crc_matches());
        let iend = r.next_chunk().unwrap().unwrap();
        assert_eq!(iend.crc(), 0xAE42_6082);
        assert!(r.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_bad_name_writes_nothing() {
        let mut w = PngWriter::new(Vec::new());
        assert!(matches!(w.write("ID", &[1]), Err(Error::InvalidArgument(_))));
        assert!(!w.inner.header_written());
    }

    #[test]
    fn test_truncated_chunk() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 10, b'I', b'D', b'A', b'T', 1, 2]);
        let mut r = PngReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.next_chunk(), Err(Error::Truncated { needed: 10, got: 2 })));
    }
}
