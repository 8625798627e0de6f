// Vorbis header packets carried in the first OGG pages
//
// Vorbis Structure:
// 1. Identification Header (type 1) - first page
// 2. Comment Header (type 3) - may span several pages
// 3. Setup Header (type 5)
// 4. Audio Data pages

use std::io::Read;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ogg::packet::PacketReader;
use crate::ogg::OggReader;

const VORBIS_MAGIC: &[u8; 6] = b"vorbis";
const PACKET_IDENTIFICATION: u8 = 1;
const PACKET_COMMENT: u8 = 3;

fn expect_header(packet: &mut PacketReader, packet_type: u8) -> Result<()> {
    let found = packet.read_byte()?.ok_or(Error::EndOfStream)?;
    if found != packet_type || !packet.read_for(VORBIS_MAGIC)? {
        return Err(Error::format(format!(
            "Not a Vorbis header packet of type {}",
            packet_type
        )));
    }
    Ok(())
}

/// Vorbis identification header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VorbisIdentification {
    pub version: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    /// Short block size, as a power of two exponent
    pub blocksize_0: u8,
    /// Long block size, as a power of two exponent
    pub blocksize_1: u8,
}

impl VorbisIdentification {
    pub fn parse(packet: &mut PacketReader) -> Result<Self> {
        expect_header(packet, PACKET_IDENTIFICATION)?;
        let version = packet.read_u32()?;
        let channels = packet.read_byte()?.ok_or(Error::EndOfStream)?;
        let sample_rate = packet.read_u32()?;
        let bitrate_maximum = packet.read_u32()? as i32;
        let bitrate_nominal = packet.read_u32()? as i32;
        let bitrate_minimum = packet.read_u32()? as i32;
        let blocksize_0 = packet.read_bits(4)?.ok_or(Error::EndOfStream)? as u8;
        let blocksize_1 = packet.read_bits(4)?.ok_or(Error::EndOfStream)? as u8;
        let framing = packet.read_bit()?.unwrap_or(false);

        if channels == 0 || sample_rate == 0 || !framing {
            return Err(Error::invalid_data("Corrupt Vorbis identification header"));
        }

        Ok(VorbisIdentification {
            version,
            channels,
            sample_rate,
            bitrate_maximum,
            bitrate_nominal,
            bitrate_minimum,
            blocksize_0,
            blocksize_1,
        })
    }
}

/// Vorbis comment structure
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VorbisComment {
    pub vendor_string: String,
    pub comments: Vec<(String, String)>,
}

impl VorbisComment {
    /// Parse a comment header packet, starting at its type byte.
    pub fn parse(packet: &mut PacketReader) -> Result<Self> {
        expect_header(packet, PACKET_COMMENT)?;

        let vendor_length = packet.read_u32()? as usize;
        let vendor_string = packet.read_string(vendor_length)?;

        let comment_count = packet.read_u32()? as usize;
        let mut comments = Vec::with_capacity(comment_count.min(1024));
        for _ in 0..comment_count {
            let comment_length = packet.read_u32()? as usize;
            let comment_string = packet.read_string(comment_length)?;

            // Parse comment (format: FIELD=value)
            if let Some((field, value)) = comment_string.split_once('=') {
                comments.push((field.to_string(), value.to_string()));
            }
        }

        Ok(VorbisComment {
            vendor_string,
            comments,
        })
    }

    /// Get a comment value by field name
    pub fn get(&self, field: &str) -> Option<&String> {
        self.comments
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }
}

/// The identification and comment headers of a Vorbis stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VorbisHeaders {
    pub identification: VorbisIdentification,
    pub comment: Option<VorbisComment>,
}

/// Read the first two Vorbis headers from the start of an OGG stream.
///
/// Header packets may straddle pages; the pieces are joined here.
pub fn read_headers<R: Read>(reader: &mut OggReader<R>) -> Result<VorbisHeaders> {
    let mut packets: Vec<Vec<u8>> = Vec::new();
    let mut pending: Option<Vec<u8>> = None;

    while packets.len() < 2 {
        let Some(mut page) = reader.next_page()? else {
            break;
        };
        let open = page.ends_with_partial_packet();
        let continued = page.is_continuation();
        let page_packets: Vec<Vec<u8>> = std::iter::from_fn(|| page.take_packet()).collect();
        let last = page_packets.len().saturating_sub(1);

        for (index, mut bytes) in page_packets.into_iter().enumerate() {
            if index == 0 && continued {
                if let Some(mut head) = pending.take() {
                    head.append(&mut bytes);
                    bytes = head;
                }
            }
            if index == last && open {
                pending = Some(bytes);
            } else {
                packets.push(bytes);
            }
        }
    }

    let mut packets = packets.into_iter();
    let first = packets
        .next()
        .ok_or_else(|| Error::format("No Vorbis identification header"))?;
    let identification = VorbisIdentification::parse(&mut PacketReader::new(first))?;
    let comment = packets
        .next()
        .map(|bytes| VorbisComment::parse(&mut PacketReader::new(bytes)))
        .transpose()?;

    Ok(VorbisHeaders {
        identification,
        comment,
    })
}
