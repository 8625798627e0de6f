// CLI command implementations
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use chunkio::ogg::vorbis;
use chunkio::utils::io::read_up_to;
use chunkio::{detect_file_type, Endian, FileKind, OggReader, PngReader, StreamReader, WavReader};

use crate::cli::output::{OutputFormatter, ProgressBar};
use crate::cli::{BatchOperation, CliError, CliResult, Commands, Config};

/// Dispatch the parsed command line
pub fn run(config: Config) -> CliResult<()> {
    let formatter = OutputFormatter::new(config.format, config.quiet);

    match config.command {
        Commands::Detect { files } => command_detect(&files, &formatter),
        Commands::Chunks { files, payload } => command_chunks(&files, payload, &formatter),
        Commands::Verify { files } => command_verify(&files, &formatter),
        Commands::Samples { file, count } => command_samples(&file, count, &formatter),
        Commands::Info { files, detailed } => command_info(&files, detailed, &formatter),
        Commands::Batch {
            directory,
            pattern,
            operation,
        } => command_batch(&directory, &pattern, operation, &formatter),
    }
}

fn ensure_exists(path: &Path) -> CliResult<()> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn detect_known(path: &Path) -> CliResult<FileKind> {
    ensure_exists(path)?;
    detect_file_type(path)?
        .ok_or_else(|| CliError::InvalidFormat(format!("{}: unknown container", path.display())))
}

/// Detect file formats
fn command_detect(files: &[PathBuf], formatter: &OutputFormatter) -> CliResult<()> {
    for path in files {
        if let Err(e) = ensure_exists(path) {
            formatter.print_error(&e.to_string());
            continue;
        }
        let kind = detect_file_type(path)?;
        formatter.emit(&json!({
            "file": path.display().to_string(),
            "format": kind,
        }))?;
    }
    Ok(())
}

/// List the chunks, pages or layout of each file
fn command_chunks(files: &[PathBuf], payload: bool, formatter: &OutputFormatter) -> CliResult<()> {
    for path in files {
        let report = match detect_known(path)? {
            FileKind::Png => png_chunks(path, payload)?,
            FileKind::Ogg => ogg_pages(path, payload)?,
            FileKind::Wav => wav_layout(path)?,
        };
        formatter.emit(&report)?;
    }
    Ok(())
}

fn png_chunks(path: &Path, payload: bool) -> CliResult<Value> {
    let mut reader = PngReader::open(path)?;
    let mut chunks = Vec::new();
    for chunk in reader.chunks() {
        let chunk = chunk?;
        let mut entry = json!({
            "name": chunk.name(),
            "length": chunk.length(),
            "crc": format!("{:08x}", chunk.crc()),
            "crc_ok": chunk.crc_matches(),
            "ancillary": chunk.is_ancillary(),
            "private": chunk.is_private(),
            "safe_to_copy": chunk.is_safe_to_copy(),
        });
        if payload {
            entry["payload"] = json!(STANDARD.encode(chunk.data()));
        }
        chunks.push(entry);
    }
    Ok(json!({
        "file": path.display().to_string(),
        "format": FileKind::Png,
        "chunks": chunks,
    }))
}

fn ogg_pages(path: &Path, payload: bool) -> CliResult<Value> {
    let mut reader = OggReader::open(path)?;
    let mut pages = Vec::new();
    for page in reader.pages() {
        let mut page = page?;
        debug!(page = %page, "listing page");
        let mut entry = json!({
            "sequence": page.sequence_number(),
            "serial": format!("{:08x}", page.serial_number()),
            "granule_position": page.granule_position(),
            "continuation": page.is_continuation(),
            "first": page.is_first_page(),
            "last": page.is_last_page(),
            "partial_packet": page.ends_with_partial_packet(),
        });
        let packets: Vec<Vec<u8>> = std::iter::from_fn(|| page.take_packet()).collect();
        entry["packet_sizes"] = json!(packets.iter().map(Vec::len).collect::<Vec<_>>());
        if payload {
            entry["packets"] = json!(packets.iter().map(|p| STANDARD.encode(p)).collect::<Vec<_>>());
        }
        pages.push(entry);
    }
    Ok(json!({
        "file": path.display().to_string(),
        "format": FileKind::Ogg,
        "pages": pages,
    }))
}

fn wav_layout(path: &Path) -> CliResult<Value> {
    let reader = WavReader::open(path)?;
    Ok(json!({
        "file": path.display().to_string(),
        "format": FileKind::Wav,
        "sound": reader.info(),
        "data_offset": reader.data_offset(),
        "data_length": reader.data_length(),
        "frames": reader.frame_count(),
    }))
}

/// Count chunks whose stored CRC differs from the computed one
fn verify_png(path: &Path, formatter: &OutputFormatter) -> CliResult<usize> {
    if detect_known(path)? != FileKind::Png {
        return Err(CliError::InvalidFormat(format!("{}: not a PNG file", path.display())));
    }
    let mut reader = PngReader::open(path)?;
    let mut mismatches = 0;
    for chunk in reader.chunks() {
        let chunk = chunk?;
        if !chunk.crc_matches() {
            formatter.print_error(&format!(
                "{}: {} stored {:08x}, computed {:08x}",
                path.display(),
                chunk.name(),
                chunk.crc(),
                chunk.computed_crc()
            ));
            mismatches += 1;
        }
    }
    Ok(mismatches)
}

/// Verify PNG chunk CRCs, failing if any mismatch
fn command_verify(files: &[PathBuf], formatter: &OutputFormatter) -> CliResult<()> {
    let mut mismatches = 0;
    for path in files {
        let bad = verify_png(path, formatter)?;
        if bad == 0 {
            formatter.print_success(&path.display().to_string());
        }
        mismatches += bad;
    }
    if mismatches > 0 {
        return Err(CliError::CrcMismatch(mismatches));
    }
    Ok(())
}

/// Print the first `count` decoded frames of a WAV file
fn command_samples(path: &Path, count: usize, formatter: &OutputFormatter) -> CliResult<()> {
    ensure_exists(path)?;
    let mut reader = WavReader::open(path)?;
    let channels = usize::from(reader.info().channels());

    let mut buffers = vec![vec![0.0f64; count]; channels];
    let frames = {
        let mut slices: Vec<&mut [f64]> = buffers.iter_mut().map(Vec::as_mut_slice).collect();
        reader.read_samples(&mut slices)?
    };

    let frame_values: Vec<Vec<f64>> = (0..frames)
        .map(|frame| buffers.iter().map(|channel| channel[frame]).collect())
        .collect();
    formatter.emit(&json!({
        "file": path.display().to_string(),
        "channels": channels,
        "frames": frames,
        "samples": frame_values,
    }))
}

/// Width and height from an IHDR chunk
fn png_dimensions(path: &Path) -> CliResult<Option<(u32, u32)>> {
    let mut reader = PngReader::open(path)?;
    match reader.next_chunk()? {
        Some(chunk) if chunk.chunk_type() == chunkio::ChunkType::IHDR => {
            let mut data = StreamReader::new(chunk.data(), Endian::Big);
            Ok(Some((data.read_u32()?, data.read_u32()?)))
        }
        _ => Ok(None),
    }
}

fn detailed_info(path: &Path, kind: FileKind) -> CliResult<Value> {
    match kind {
        FileKind::Png => {
            let dimensions = png_dimensions(path)?;
            let chunk_count = PngReader::open(path)?.chunks().count();
            Ok(json!({
                "width": dimensions.map(|(w, _)| w),
                "height": dimensions.map(|(_, h)| h),
                "chunks": chunk_count,
            }))
        }
        FileKind::Ogg => {
            let mut reader = OggReader::open(path)?;
            match vorbis::read_headers(&mut reader) {
                Ok(headers) => Ok(json!({ "vorbis": headers })),
                Err(e) => Ok(json!({ "codec": "unknown", "note": e.to_string() })),
            }
        }
        FileKind::Wav => {
            let reader = WavReader::open(path)?;
            let info = reader.info();
            let seconds = match info.sample_rate() {
                0 => 0.0,
                rate => reader.frame_count() as f64 / f64::from(rate),
            };
            Ok(json!({
                "sound": info,
                "bit_rate": info.bit_rate(),
                "frames": reader.frame_count(),
                "duration_seconds": seconds,
            }))
        }
    }
}

/// Show file information
fn command_info(files: &[PathBuf], detailed: bool, formatter: &OutputFormatter) -> CliResult<()> {
    for path in files {
        if let Err(e) = ensure_exists(path) {
            formatter.print_error(&e.to_string());
            continue;
        }

        let metadata = std::fs::metadata(path)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
            .and_then(|age| i64::try_from(age.as_secs()).ok())
            .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
            .map(|date| date.format("%Y-%m-%d %H:%M:%S UTC").to_string());

        let kind = detect_file_type(path)?;
        let mut magic = [0u8; 4];
        let magic_len = read_up_to(&mut std::fs::File::open(path)?, &mut magic)?;

        let mut report = json!({
            "file": path.display().to_string(),
            "size": metadata.len(),
            "modified": modified,
            "format": kind,
            "magic": hex(&magic[..magic_len]),
        });
        if detailed {
            if let Some(kind) = kind {
                report["details"] = detailed_info(path, kind)?;
            }
        }
        formatter.emit(&report)?;
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Run detect or verify over every file matching a glob
fn command_batch(
    directory: &Path,
    pattern: &str,
    operation: BatchOperation,
    formatter: &OutputFormatter,
) -> CliResult<()> {
    use glob::glob;

    // Bare names match anywhere below the directory
    let glob_pattern = if pattern.contains('*') || pattern.contains('?') {
        format!("{}/{}", directory.display(), pattern)
    } else {
        format!("{}/**/{}", directory.display(), pattern)
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob(&glob_pattern).map_err(|e| CliError::Other(format!("Invalid glob pattern: {}", e)))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => formatter.print_error(&format!("Error reading path: {}", e)),
        }
    }

    let total = files.len();
    if total == 0 {
        formatter.print_info("No files found matching pattern");
        return Ok(());
    }
    formatter.print_info(&format!("Processing {} files...", total));

    let mut progress = ProgressBar::new(total, !formatter.is_quiet());
    let mut results = Vec::with_capacity(total);
    let mut error_count = 0;
    let mut mismatches = 0;

    for path in &files {
        progress.increment(&path.display().to_string());
        let name = path.display().to_string();
        match operation {
            BatchOperation::Detect => match detect_file_type(path) {
                Ok(kind) => results.push(json!({ "file": name, "format": kind })),
                Err(e) => {
                    formatter.print_error(&format!("{}: {}", name, e));
                    error_count += 1;
                }
            },
            BatchOperation::Verify => match detect_file_type(path) {
                Ok(Some(FileKind::Png)) => match verify_png(path, formatter) {
                    Ok(bad) => {
                        mismatches += bad;
                        results.push(json!({ "file": name, "crc_mismatches": bad }));
                    }
                    Err(e) => {
                        formatter.print_error(&format!("{}: {}", name, e));
                        error_count += 1;
                    }
                },
                Ok(_) => debug!(file = %name, "skipping non-PNG file"),
                Err(e) => {
                    formatter.print_error(&format!("{}: {}", name, e));
                    error_count += 1;
                }
            },
        }
    }

    formatter.emit(&json!({
        "directory": directory.display().to_string(),
        "pattern": pattern,
        "processed": total,
        "errors": error_count,
        "results": results,
    }))?;
    formatter.print_info(&format!(
        "Completed: {} successful, {} errors",
        results.len(),
        error_count
    ));

    if mismatches > 0 {
        return Err(CliError::CrcMismatch(mismatches));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkio::PngWriter;
    use std::io::Write;

    fn write_png(path: &Path) {
        let mut writer = PngWriter::create(path).unwrap();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&3u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        writer.write("IHDR", &ihdr).unwrap();
        writer.write("IEND", &[]).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_png_chunks_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path);

        let report = png_chunks(&path, true).unwrap();
        assert_eq!(report["format"], "png");
        let chunks = report["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0]["name"], "IHDR");
        assert_eq!(chunks[1]["crc"], "ae426082");
        assert_eq!(chunks[1]["payload"], "");
        assert_eq!(png_dimensions(&path).unwrap(), Some((3, 2)));
    }

    #[test]
    fn test_verify_counts_corrupt_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        write_png(&path);
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let formatter = OutputFormatter::new(Default::default(), true);
        assert_eq!(verify_png(&path, &formatter).unwrap(), 1);
        assert!(matches!(
            command_verify(&[path], &formatter),
            Err(CliError::CrcMismatch(1))
        ));
    }

    #[test]
    fn test_unknown_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(matches!(detect_known(&path), Err(CliError::InvalidFormat(_))));
        assert!(matches!(
            detect_known(&dir.path().join("missing")),
            Err(CliError::FileNotFound(_))
        ));
    }
}
