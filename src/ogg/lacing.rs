// Ogg lacing: packets <-> 255-byte segments

use crate::error::{Error, Result};

/// Segment size that means "the packet continues"
pub const CONTINUE_SEGMENT: u8 = 255;

/// Packets rebuilt from one page
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Laced {
    pub packets: Vec<Vec<u8>>,
    /// The table ended on a 255 segment, so the last packet goes on in the next page
    pub open_packet: bool,
}

/// Split a page payload into packets according to its segment table.
///
/// A segment shorter than 255 closes the pending packet, which may be empty.
/// A packet still open after the last segment is kept and flagged.
pub fn split_packets(segment_table: &[u8], payload: &[u8]) -> Result<Laced> {
    let expected: usize = segment_table.iter().map(|&s| s as usize).sum();
    if expected != payload.len() {
        return Err(Error::invalid_data(format!(
            "Segment table covers {} bytes, payload has {}",
            expected,
            payload.len()
        )));
    }

    let mut laced = Laced::default();
    let mut pending = Vec::new();
    let mut offset = 0;
    for &segment in segment_table {
        let end = offset + segment as usize;
        pending.extend_from_slice(&payload[offset..end]);
        offset = end;
        if segment < CONTINUE_SEGMENT {
            laced.packets.push(std::mem::take(&mut pending));
        }
    }
    if segment_table.last() == Some(&CONTINUE_SEGMENT) {
        laced.packets.push(pending);
        laced.open_packet = true;
    }
    Ok(laced)
}

/// Lacing values for a single packet of `len` bytes.
///
/// A length that is a multiple of 255 gets a trailing 0 segment so the packet
/// is closed.
pub fn lacing_values(len: usize) -> Vec<u8> {
    let mut table = vec![CONTINUE_SEGMENT; len / 255];
    table.push((len % 255) as u8);
    table
}
