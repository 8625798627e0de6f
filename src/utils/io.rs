// I/O helpers shared by the codec and the file-based adapters

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Read until `buffer` is full or the source is exhausted.
///
/// Returns the number of bytes placed in `buffer`. Unlike `read_exact`, a short
/// source is not an error here: callers decide whether 0 means "end of stream"
/// and whether a partial fill means truncation.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Check if the source has `signature` at the current position.
///
/// The position is restored afterwards; a source shorter than the signature
/// simply does not match.
pub fn check_signature<R: Read + Seek>(reader: &mut R, signature: &[u8]) -> std::io::Result<bool> {
    let pos = reader.stream_position()?;
    let mut buffer = vec![0u8; signature.len()];
    let read = read_up_to(reader, &mut buffer)?;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(read == signature.len() && buffer == signature)
}

/// Create (or truncate) a file, creating any missing parent directories first.
pub fn create_file<P: AsRef<Path>>(path: P) -> std::io::Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    File::create(path)
}
