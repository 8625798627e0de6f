use std::collections::VecDeque;
use std::fmt;
use std::io::Read;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::StreamReader;
use crate::error::{Error, Result};
use crate::ogg::lacing;
use crate::ogg::packet::PacketReader;
use crate::ogg::{
    OGG_HEADER_TYPE_BOS, OGG_HEADER_TYPE_CONTINUATION, OGG_HEADER_TYPE_EOS, OGG_SIGNATURE,
};

/// Fixed part of a page header after the capture pattern
const HEADER_LEN_AFTER_SYNC: usize = 23;

/// OGG page header fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OggPageHeader {
    pub version: u8,
    pub header_type: u8,
    pub granule_position: u64,
    pub bitstream_serial: u32,
    pub page_sequence: u32,
    pub crc: u32,
    pub segment_table: Vec<u8>,
}

impl OggPageHeader {
    /// Read the header that follows an already consumed "OggS".
    fn read<R: Read>(reader: &mut StreamReader<R>) -> Result<Self> {
        let version = reader.read_u8()?;
        if version != 0 {
            warn!(version, "unexpected Ogg stream structure version");
        }
        let header_type = reader.read_u8()?;
        let granule_position = reader.read_u64()?;
        let bitstream_serial = reader.read_u32()?;
        let page_sequence = reader.read_u32()?;
        let crc = reader.read_u32()?;
        let segment_count = reader.read_u8()? as usize;
        let segment_table = reader.read_bytes(segment_count)?;

        Ok(OggPageHeader {
            version,
            header_type,
            granule_position,
            bitstream_serial,
            page_sequence,
            crc,
            segment_table,
        })
    }

    /// Total page payload size from the segment table
    pub fn data_size(&self) -> usize {
        self.segment_table.iter().map(|&x| x as usize).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_table.len()
    }

    /// First packet continues one from the previous page
    pub fn is_continuation(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_CONTINUATION != 0
    }

    /// Beginning of a logical stream
    pub fn is_bos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_BOS != 0
    }

    /// End of a logical stream
    pub fn is_eos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_EOS != 0
    }

    /// Serialize the header, capture pattern included.
    ///
    /// A page holds at most 255 segments; longer tables are `InvalidArgument`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let segment_count = u8::try_from(self.segment_table.len()).map_err(|_| {
            Error::invalid_argument(format!(
                "Segment table of {} entries does not fit in one page",
                self.segment_table.len()
            ))
        })?;
        let mut out =
            Vec::with_capacity(OGG_SIGNATURE.len() + HEADER_LEN_AFTER_SYNC + self.segment_table.len());
        out.extend_from_slice(OGG_SIGNATURE);
        out.push(self.version);
        out.push(self.header_type);
        out.extend_from_slice(&self.granule_position.to_le_bytes());
        out.extend_from_slice(&self.bitstream_serial.to_le_bytes());
        out.extend_from_slice(&self.page_sequence.to_le_bytes());
        out.extend_from_slice(&self.crc.to_le_bytes());
        out.push(segment_count);
        out.extend_from_slice(&self.segment_table);
        Ok(out)
    }
}

/// One OGG page with its packets queued in order.
///
/// The first packet is loaded into the current packet reader straight away;
/// `next_packet` moves on to the following one.
#[derive(Debug)]
pub struct OggPage {
    header: OggPageHeader,
    packets: VecDeque<Vec<u8>>,
    open_packet: bool,
    current: Option<PacketReader>,
}

impl OggPage {
    /// Read header, segment table and payload after a sync pattern.
    ///
    /// Running out of data anywhere in the page is `Truncated`.
    pub(crate) fn read_after_sync<R: Read>(reader: &mut StreamReader<R>) -> Result<Self> {
        let header =
            OggPageHeader::read(reader).map_err(|e| e.into_truncated(HEADER_LEN_AFTER_SYNC))?;
        let size = header.data_size();
        let payload = reader.read_bytes(size).map_err(|e| e.into_truncated(size))?;
        let page = Self::from_parts(header, &payload)?;
        debug!(
            sequence = page.header.page_sequence,
            serial = page.header.bitstream_serial,
            packets = page.packets.len() + usize::from(page.current.is_some()),
            size,
            "read Ogg page"
        );
        Ok(page)
    }

    /// Build a page from a parsed header and its payload.
    pub fn from_parts(header: OggPageHeader, payload: &[u8]) -> Result<Self> {
        let laced = lacing::split_packets(&header.segment_table, payload)?;
        let mut page = OggPage {
            header,
            packets: laced.packets.into(),
            open_packet: laced.open_packet,
            current: None,
        };
        page.next_packet();
        Ok(page)
    }

    pub fn header(&self) -> &OggPageHeader {
        &self.header
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn granule_position(&self) -> u64 {
        self.header.granule_position
    }

    pub fn serial_number(&self) -> u32 {
        self.header.bitstream_serial
    }

    pub fn sequence_number(&self) -> u32 {
        self.header.page_sequence
    }

    pub fn crc(&self) -> u32 {
        self.header.crc
    }

    pub fn segment_count(&self) -> usize {
        self.header.segment_count()
    }

    pub fn is_continuation(&self) -> bool {
        self.header.is_continuation()
    }

    pub fn is_first_page(&self) -> bool {
        self.header.is_bos()
    }

    pub fn is_last_page(&self) -> bool {
        self.header.is_eos()
    }

    /// The last packet is not finished on this page
    pub fn ends_with_partial_packet(&self) -> bool {
        self.open_packet
    }

    /// Packets queued behind the current one
    pub fn packets_remaining(&self) -> usize {
        self.packets.len()
    }

    /// Reader for the current packet, if any
    pub fn packet(&mut self) -> Option<&mut PacketReader> {
        self.current.as_mut()
    }

    /// Advance to the next queued packet. Returns false when none is left.
    pub fn next_packet(&mut self) -> bool {
        self.current = self.packets.pop_front().map(PacketReader::new);
        self.current.is_some()
    }

    /// Hand out the current packet's bytes and advance.
    pub fn take_packet(&mut self) -> Option<Vec<u8>> {
        let bytes = self.current.take().map(PacketReader::into_bytes);
        self.next_packet();
        bytes
    }

    /// The current packet still has unread bits
    pub fn has_bits_left(&self) -> bool {
        self.current.as_ref().is_some_and(PacketReader::has_bits_left)
    }

    /// Read from the current packet, `None` when it is spent or there is none.
    pub fn read_bits(&mut self, count: u32) -> Result<Option<u32>> {
        match self.current.as_mut() {
            Some(packet) => packet.read_bits(count),
            None if count > 32 => Err(Error::invalid_argument(format!(
                "Cannot read {} bits from a packet at once",
                count
            ))),
            None => Ok(None),
        }
    }
}

impl fmt::Display for OggPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OggS v{}, h{}, Granule {:016x}, Serial {:08x}, Seq {}, CRC {:08x}",
            self.header.version,
            self.header.header_type,
            self.header.granule_position,
            self.header.bitstream_serial,
            self.header.page_sequence,
            self.header.crc
        )
    }
}

/// Build the segment table for a run of whole packets.
///
/// The table may exceed the 255 entries one page can carry; such a table has
/// to be split across pages before `OggPageHeader::to_bytes` accepts it.
pub fn segment_table_for(packets: &[&[u8]]) -> Vec<u8> {
    packets
        .iter()
        .flat_map(|packet| lacing::lacing_values(packet.len()))
        .collect()
}
