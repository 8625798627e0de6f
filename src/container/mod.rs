// Header-then-chunks container abstraction
//
// A container file is a header followed by zero or more chunk records with no
// explicit count. Formats plug in through ContainerFormat; the reader and the
// writer own the stream cursor and the resumable state.

use std::io::{Read, Write};
use std::marker::PhantomData;

use tracing::debug;

use crate::codec::{Endian, StreamReader, StreamWriter};
use crate::error::{optional, Result};

/// Anything that can lay itself out as bytes
pub trait ByteSerializable {
    fn to_bytes(&self) -> Vec<u8>;
}

/// Leading record of a container file
pub trait ContainerHeader: ByteSerializable {}

/// One record after the header
pub trait ContainerChunk: ByteSerializable {
    /// The chunk body, without framing
    fn payload(&self) -> &[u8];
}

/// Format hooks used by `ContainerReader`
pub trait ContainerFormat {
    type Header: ContainerHeader;
    type Chunk: ContainerChunk;

    /// Byte order of the format's multi-byte fields
    const ENDIAN: Endian;

    /// Read and validate the header at the start of the stream.
    fn read_header<R: Read>(reader: &mut StreamReader<R>) -> Result<Self::Header>;

    /// Read the next chunk.
    ///
    /// `Err(EndOfStream)` before the chunk starts means there are no more
    /// chunks; the reader turns it into `Ok(None)`.
    fn read_chunk<R: Read>(
        reader: &mut StreamReader<R>,
        header: &Self::Header,
    ) -> Result<Self::Chunk>;
}

/// Reads a header at construction, then chunks on demand
pub struct ContainerReader<F: ContainerFormat, R: Read> {
    reader: StreamReader<R>,
    header: F::Header,
    chunks_read: usize,
    finished: bool,
    _format: PhantomData<F>,
}

impl<F: ContainerFormat, R: Read> ContainerReader<F, R> {
    /// Wrap `source` and read the header.
    pub fn new(source: R) -> Result<Self> {
        let mut reader = StreamReader::new(source, F::ENDIAN);
        let header = F::read_header(&mut reader)?;
        Ok(ContainerReader {
            reader,
            header,
            chunks_read: 0,
            finished: false,
            _format: PhantomData,
        })
    }

    pub fn header(&self) -> &F::Header {
        &self.header
    }

    /// Next chunk, or `None` at the end of the stream.
    ///
    /// Once `None` or an error has been returned every later call returns
    /// `None`.
    pub fn next_chunk(&mut self) -> Result<Option<F::Chunk>> {
        if self.finished {
            return Ok(None);
        }
        let next = optional(F::read_chunk(&mut self.reader, &self.header));
        if next.is_err() {
            self.finished = true;
        }
        match next? {
            Some(chunk) => {
                self.chunks_read += 1;
                Ok(Some(chunk))
            }
            None => {
                debug!(chunks = self.chunks_read, "end of container");
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Iterate over the remaining chunks.
    pub fn chunks(&mut self) -> Chunks<'_, F, R> {
        Chunks { reader: self }
    }

    /// Number of chunks returned so far
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Iterator returned by `ContainerReader::chunks`
pub struct Chunks<'a, F: ContainerFormat, R: Read> {
    reader: &'a mut ContainerReader<F, R>,
}

impl<F: ContainerFormat, R: Read> Iterator for Chunks<'_, F, R> {
    type Item = Result<F::Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_chunk().transpose()
    }
}

/// Writes the header lazily, just before the first chunk
pub struct ContainerWriter<H: ContainerHeader, W: Write> {
    writer: StreamWriter<W>,
    header: H,
    header_written: bool,
}

impl<H: ContainerHeader, W: Write> ContainerWriter<H, W> {
    pub fn new(sink: W, header: H, endian: Endian) -> Self {
        ContainerWriter {
            writer: StreamWriter::new(sink, endian),
            header,
            header_written: false,
        }
    }

    pub fn header(&self) -> &H {
        &self.header
    }

    /// Mutable header access, only until the header has been emitted.
    pub fn header_mut(&mut self) -> Option<&mut H> {
        if self.header_written {
            None
        } else {
            Some(&mut self.header)
        }
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    fn ensure_header(&mut self) -> Result<()> {
        if !self.header_written {
            let bytes = self.header.to_bytes();
            debug!(len = bytes.len(), "writing container header");
            self.writer.write_bytes(&bytes)?;
            self.header_written = true;
        }
        Ok(())
    }

    /// Serialize `chunk`, preceded by the header on the first call.
    pub fn write_chunk<C: ContainerChunk + ?Sized>(&mut self, chunk: &C) -> Result<()> {
        let bytes = chunk.to_bytes();
        self.ensure_header()?;
        self.writer.write_bytes(&bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    /// Emit the header if nothing was written yet, flush and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.ensure_header()?;
        self.writer.flush()?;
        self.writer.into_inner()
    }
}
