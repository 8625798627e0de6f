// chunkio: endian-aware binary stream codec with Ogg, PNG and WAV adapters

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Serialize;

pub mod codec;
pub mod container;
pub mod error;
pub mod ogg;
pub mod png;
pub mod utils;
pub mod wav;

pub use codec::{Endian, StreamReader, StreamWriter};
pub use container::{
    ByteSerializable, ContainerChunk, ContainerFormat, ContainerHeader, ContainerReader,
    ContainerWriter,
};
pub use error::{Error, Result};
pub use ogg::{OggPage, OggReader, PacketReader};
pub use png::{ChunkType, PngChunk, PngReader, PngWriter};
pub use wav::{SoundInfo, WavReader};

use utils::io::check_signature;

/// Container formats recognised by their leading magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Png,
    Ogg,
    Wav,
}

impl FileKind {
    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Png => "png",
            FileKind::Ogg => "ogg",
            FileKind::Wav => "wav",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the container format at the current position of `reader`.
///
/// The position is restored afterwards. Returns `None` for anything else.
pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Option<FileKind>> {
    // Check for PNG
    if check_signature(reader, png::PNG_SIGNATURE)? {
        return Ok(Some(FileKind::Png));
    }

    // Check for OGG
    if check_signature(reader, ogg::OGG_SIGNATURE)? {
        return Ok(Some(FileKind::Ogg));
    }

    // Check for RIFF/RIFX with a WAVE form type
    let start = reader.stream_position()?;
    let mut riff = [0u8; 12];
    let read = utils::io::read_up_to(reader, &mut riff)?;
    reader.seek(std::io::SeekFrom::Start(start))?;
    if read == riff.len()
        && (&riff[0..4] == wav::RIFF_TAG || &riff[0..4] == wav::RIFX_TAG)
        && &riff[8..12] == wav::WAVE_TAG
    {
        return Ok(Some(FileKind::Wav));
    }

    Ok(None)
}

/// Detect the container format of a file.
pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<Option<FileKind>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    detect(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect() {
        let png = png::PNG_SIGNATURE.to_vec();
        assert_eq!(detect(&mut Cursor::new(png)).unwrap(), Some(FileKind::Png));
        assert_eq!(
            detect(&mut Cursor::new(b"OggS\0\x02".to_vec())).unwrap(),
            Some(FileKind::Ogg)
        );
        assert_eq!(
            detect(&mut Cursor::new(b"RIFX\0\0\0\x24WAVEfmt ".to_vec())).unwrap(),
            Some(FileKind::Wav)
        );
        assert_eq!(detect(&mut Cursor::new(b"RIFF\0\0\0\0AVI ".to_vec())).unwrap(), None);
        assert_eq!(detect(&mut Cursor::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn test_detect_restores_position() {
        let mut cursor = Cursor::new(b"RIFF\0\0\0\0WAVE".to_vec());
        detect(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 0);
    }
}
