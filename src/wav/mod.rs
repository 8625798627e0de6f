// WAV (RIFF/RIFX) PCM reading
//
// Layout: "RIFF" | size | "WAVE" | "fmt " size body | { tag size body } | "data" size PCM
// Chunk bodies of odd length are followed by one pad byte. RIFX files use the
// same layout with every number big-endian.

mod info;

pub use info::{SampleType, SoundInfo, FORMAT_PCM};

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use crate::codec::{Endian, StreamReader};
use crate::error::{Error, Result};

pub const RIFF_TAG: &[u8; 4] = b"RIFF";
pub const RIFX_TAG: &[u8; 4] = b"RIFX";
pub const WAVE_TAG: &[u8; 4] = b"WAVE";
pub const FMT_TAG: &[u8; 4] = b"fmt ";
pub const DATA_TAG: &[u8; 4] = b"data";

/// Widest sample, in bytes, that `read_samples` decodes
const MAX_BYTES_PER_SAMPLE: u16 = 4;

fn not_wav(e: Error) -> Error {
    match e {
        Error::EndOfStream | Error::Truncated { .. } => Error::format("Not a WAV file"),
        other => other,
    }
}

fn no_data_chunk(e: Error) -> Error {
    match e {
        Error::EndOfStream | Error::Truncated { .. } => Error::format("WAV file with no data chunk"),
        other => other,
    }
}

/// PCM WAV reader
///
/// Construction parses the format and positions the source at the first
/// sample; `read_samples` then decodes frames into `[-1.0, 1.0]`.
pub struct WavReader<R: Read + Seek> {
    reader: StreamReader<R>,
    info: SoundInfo,
    data_offset: u64,
    data_length: u64,
}

impl WavReader<BufReader<File>> {
    /// Open a WAV file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> WavReader<R> {
    pub fn new(source: R) -> Result<Self> {
        let mut reader = StreamReader::new(source, Endian::Little);

        let riff = reader.read_bytes(4).map_err(not_wav)?;
        let endian = match riff.as_slice() {
            tag if tag == RIFF_TAG => Endian::Little,
            tag if tag == RIFX_TAG => Endian::Big,
            _ => return Err(Error::format("Not a WAV file")),
        };
        reader.set_endian(endian);

        let _riff_size = reader.read_u32().map_err(not_wav)?;
        if !reader.read_for(WAVE_TAG).map_err(not_wav)? {
            return Err(Error::format("Not a WAV file"));
        }
        if !reader.read_for(FMT_TAG).map_err(not_wav)? {
            return Err(Error::format("WAV file does not start with a fmt chunk"));
        }

        let fmt_len = reader.read_u32().map_err(not_wav)? as usize;
        let body = reader.read_bytes(fmt_len).map_err(|e| e.into_truncated(fmt_len))?;
        if fmt_len % 2 == 1 {
            reader.skip(1)?;
        }
        let info = SoundInfo::parse_fmt(&body, endian)?;
        if info.expected_byte_rate() != u64::from(info.byte_rate()) {
            warn!(
                declared = info.byte_rate(),
                expected = info.expected_byte_rate(),
                "WAV byte rate disagrees with sample rate and block alignment"
            );
        }

        let data_length = loop {
            let tag = reader.read_bytes(4).map_err(no_data_chunk)?;
            let size = reader.read_u32().map_err(no_data_chunk)?;
            if tag == DATA_TAG {
                break u64::from(size);
            }
            let padded = u64::from(size) + u64::from(size & 1);
            trace!(
                chunk = %String::from_utf8_lossy(&tag),
                size,
                "skipping RIFF chunk"
            );
            reader.skip(padded)?;
        };
        let data_offset = reader.stream_position()?;

        debug!(
            channels = info.channels(),
            sample_rate = info.sample_rate(),
            bits = info.bits_per_sample(),
            %endian,
            data_offset,
            data_length,
            "opened WAV"
        );

        Ok(WavReader {
            reader,
            info,
            data_offset,
            data_length,
        })
    }

    pub fn info(&self) -> &SoundInfo {
        &self.info
    }

    /// Byte offset of the first sample
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Declared size of the data chunk in bytes
    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    /// Whole frames in the data chunk
    pub fn frame_count(&self) -> u64 {
        match self.info.frame_size() as u64 {
            0 => 0,
            size => self.data_length / size,
        }
    }

    /// Rewind to the first sample.
    pub fn seek_to_data(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(self.data_offset))?;
        Ok(())
    }

    /// Bytes consumed from the data chunk so far
    pub fn position_in_data(&mut self) -> Result<u64> {
        let pos = self.reader.stream_position()?;
        Ok(pos.saturating_sub(self.data_offset))
    }

    /// Decode frames into one output slice per channel.
    ///
    /// All slices must have the same length; at most that many frames are
    /// read. Returns the number of frames decoded, 0 once the data chunk is
    /// exhausted. A trailing partial frame is treated as exhausted.
    pub fn read_samples(&mut self, out: &mut [&mut [f64]]) -> Result<usize> {
        let channels = usize::from(self.info.channels());
        if out.len() != channels {
            return Err(Error::invalid_argument(format!(
                "Expected {} output channels, got {}",
                channels,
                out.len()
            )));
        }
        let frames_wanted = out.first().map_or(0, |channel| channel.len());
        if out.iter().any(|channel| channel.len() != frames_wanted) {
            return Err(Error::invalid_argument("Output channels differ in length"));
        }

        let bytes_per_sample = self.info.bytes_per_sample();
        if bytes_per_sample == 0 || bytes_per_sample > MAX_BYTES_PER_SAMPLE {
            return Err(Error::unsupported(format!(
                "{}-byte PCM samples",
                bytes_per_sample
            )));
        }

        let end = self.data_offset + self.data_length;
        let mut pos = self.reader.stream_position()?;
        if pos < self.data_offset || pos > end {
            return Err(Error::invalid_data("Read position is outside the data chunk"));
        }

        let decoder = SampleDecoder::new(&self.info);
        let frame_size = self.info.frame_size() as u64;
        let mut frames = 0;
        while frames < frames_wanted && pos + frame_size <= end {
            let frame = match self.reader.read_bytes(frame_size as usize) {
                Ok(frame) => frame,
                Err(Error::EndOfStream) | Err(Error::Truncated { .. }) => {
                    warn!(pos, end, "WAV data ends before its declared length");
                    break;
                }
                Err(e) => return Err(e),
            };
            for (channel, sample) in frame.chunks_exact(usize::from(bytes_per_sample)).enumerate() {
                out[channel][frames] = decoder.decode(sample);
            }
            pos += frame_size;
            frames += 1;
        }
        Ok(frames)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Maps raw PCM integers linearly onto [-1, 1]
struct SampleDecoder {
    endian: Endian,
    signed: bool,
    width: usize,
    lo: f64,
    hi: f64,
}

impl SampleDecoder {
    fn new(info: &SoundInfo) -> Self {
        let width = usize::from(info.bytes_per_sample());
        let bits = (width * 8) as u32;
        let signed = info.sample_type() == SampleType::Signed;
        let (lo, hi) = if signed {
            (-((1i64 << (bits - 1)) as f64), ((1i64 << (bits - 1)) - 1) as f64)
        } else {
            (0.0, ((1i64 << bits) - 1) as f64)
        };
        SampleDecoder {
            endian: info.sample_endian(),
            signed,
            width,
            lo,
            hi,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f64 {
        let raw = match self.endian {
            Endian::Big => BigEndian::read_uint(bytes, self.width),
            Endian::Little => LittleEndian::read_uint(bytes, self.width),
        } as i64;
        let value = if self.signed && raw >= 1i64 << (self.width * 8 - 1) {
            raw - (1i64 << (self.width * 8))
        } else {
            raw
        };
        (value as f64 - self.lo) / (self.hi - self.lo) * 2.0 - 1.0
    }
}
