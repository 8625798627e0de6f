// OGG page and packet reading
//
// OGG File Structure:
// - OGG Page Header (27 bytes)
//   - Capture Pattern: "OggS" (4 bytes)
//   - Version: 0 (1 byte)
//   - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//   - Granule Position (8 bytes)
//   - Bitstream Serial Number (4 bytes)
//   - Page Sequence Number (4 bytes)
//   - CRC Checksum (4 bytes)
//   - Number of Page Segments (1 byte)
//   - Segment Table (variable)
// - Payload: packets laced into the segments
//
// All multi-byte fields are little-endian. Pages are found by scanning for
// the capture pattern, so junk between pages is skipped.

pub mod lacing;
pub mod packet;
pub mod page;
pub mod vorbis;

pub use packet::PacketReader;
pub use page::{OggPage, OggPageHeader};
pub use vorbis::{VorbisComment, VorbisHeaders, VorbisIdentification};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::codec::{Endian, StreamReader};
use crate::error::{Error, Result};

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

// OGG page header types
pub const OGG_HEADER_TYPE_CONTINUATION: u8 = 0x01;
pub const OGG_HEADER_TYPE_BOS: u8 = 0x02; // Beginning of Stream
pub const OGG_HEADER_TYPE_EOS: u8 = 0x04; // End of Stream

/// Sync-scanning OGG page reader
pub struct OggReader<R: Read> {
    reader: StreamReader<R>,
    pages_read: usize,
    finished: bool,
}

impl OggReader<BufReader<File>> {
    /// Open an OGG file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> OggReader<R> {
    pub fn new(source: R) -> Self {
        OggReader {
            reader: StreamReader::new(source, Endian::Little),
            pages_read: 0,
            finished: false,
        }
    }

    /// Next page, or `None` at the end of the stream.
    ///
    /// A stream that ends before any capture pattern was found is not an OGG
    /// stream at all and fails with `FormatMismatch`.
    pub fn next_page(&mut self) -> Result<Option<OggPage>> {
        if self.finished {
            return Ok(None);
        }
        if !self.reader.seek_to_pattern(OGG_SIGNATURE)? {
            self.finished = true;
            if self.pages_read == 0 {
                return Err(Error::format("No OGG page found"));
            }
            debug!(pages = self.pages_read, "end of OGG stream");
            return Ok(None);
        }
        let page = OggPage::read_after_sync(&mut self.reader)?;
        self.pages_read += 1;
        Ok(Some(page))
    }

    /// Iterate over the remaining pages.
    pub fn pages(&mut self) -> Pages<'_, R> {
        Pages { reader: self }
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Iterator returned by `OggReader::pages`
pub struct Pages<'a, R: Read> {
    reader: &'a mut OggReader<R>,
}

impl<R: Read> Iterator for Pages<'_, R> {
    type Item = Result<OggPage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_page().transpose()
    }
}
