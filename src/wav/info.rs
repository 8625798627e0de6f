use serde::Serialize;

use crate::codec::{Endian, StreamReader};
use crate::error::{Error, Result};

/// WAV format code for integer PCM
pub const FORMAT_PCM: u16 = 0x0001;

/// How raw sample integers are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    /// Offset binary; 8-bit WAV samples
    Unsigned,
    /// Two's complement; every wider WAV depth
    Signed,
}

/// Decoded `fmt ` chunk of a PCM WAV file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundInfo {
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
    bytes_per_sample: u16,
    sample_endian: Endian,
    sample_type: SampleType,
}

impl SoundInfo {
    /// Describe integer PCM with `bits_per_sample` bits per sample.
    pub fn pcm(
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        sample_endian: Endian,
    ) -> Result<Self> {
        if channels == 0 || bits_per_sample == 0 {
            return Err(Error::invalid_argument("Channels and bits per sample must be nonzero"));
        }
        let bytes_per_sample = bits_per_sample.div_ceil(8);
        let block_align = channels
            .checked_mul(bytes_per_sample)
            .ok_or_else(|| Error::invalid_argument("Block alignment does not fit in 16 bits"))?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| Error::invalid_argument("Byte rate does not fit in 32 bits"))?;
        Ok(Self::from_fields(
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            sample_endian,
        ))
    }

    fn from_fields(
        channels: u16,
        sample_rate: u32,
        byte_rate: u32,
        block_align: u16,
        bits_per_sample: u16,
        sample_endian: Endian,
    ) -> Self {
        let bytes_per_sample = block_align / channels;
        let sample_type = if bytes_per_sample == 1 {
            SampleType::Unsigned
        } else {
            SampleType::Signed
        };
        SoundInfo {
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            bytes_per_sample,
            sample_endian,
            sample_type,
        }
    }

    /// Parse a `fmt ` chunk body. Only integer PCM is accepted.
    pub fn parse_fmt(body: &[u8], sample_endian: Endian) -> Result<Self> {
        if body.len() < 16 {
            return Err(Error::invalid_data(format!(
                "WAV format chunk too small: {} bytes",
                body.len()
            )));
        }
        let mut reader = StreamReader::new(body, sample_endian);
        let format_code = reader.read_u16()?;
        if format_code != FORMAT_PCM {
            return Err(Error::format(format!(
                "WAV format code {:#06x} is not PCM",
                format_code
            )));
        }
        let channels = reader.read_u16()?;
        let sample_rate = reader.read_u32()?;
        let byte_rate = reader.read_u32()?;
        let block_align = reader.read_u16()?;
        let bits_per_sample = reader.read_u16()?;

        if channels == 0 {
            return Err(Error::invalid_data("WAV format declares zero channels"));
        }
        Ok(Self::from_fields(
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            sample_endian,
        ))
    }

    /// Serialize as a 16-byte `fmt ` chunk body
    pub fn to_fmt_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        match self.sample_endian {
            Endian::Little => {
                out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
                out.extend_from_slice(&self.channels.to_le_bytes());
                out.extend_from_slice(&self.sample_rate.to_le_bytes());
                out.extend_from_slice(&self.byte_rate.to_le_bytes());
                out.extend_from_slice(&self.block_align.to_le_bytes());
                out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
            }
            Endian::Big => {
                out.extend_from_slice(&FORMAT_PCM.to_be_bytes());
                out.extend_from_slice(&self.channels.to_be_bytes());
                out.extend_from_slice(&self.sample_rate.to_be_bytes());
                out.extend_from_slice(&self.byte_rate.to_be_bytes());
                out.extend_from_slice(&self.block_align.to_be_bytes());
                out.extend_from_slice(&self.bits_per_sample.to_be_bytes());
            }
        }
        out
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Declared average bytes per second
    pub fn byte_rate(&self) -> u32 {
        self.byte_rate
    }

    pub fn bit_rate(&self) -> u64 {
        u64::from(self.byte_rate) * 8
    }

    pub fn block_align(&self) -> u16 {
        self.block_align
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Block alignment divided by channel count
    pub fn bytes_per_sample(&self) -> u16 {
        self.bytes_per_sample
    }

    pub fn sample_endian(&self) -> Endian {
        self.sample_endian
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }

    /// Byte rate that the other fields imply
    pub fn expected_byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.block_align)
    }
}
