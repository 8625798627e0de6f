// Encoding utilities

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

use crate::error::{Error, Result};

/// Resolve a WHATWG encoding label such as "utf-8", "latin1" or "UTF-16LE".
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::invalid_argument(format!("Unknown text encoding: {}", label)))
}

/// Decode text with the named encoding. Malformed sequences become U+FFFD.
pub fn decode_text(data: &[u8], label: &str) -> Result<String> {
    let encoding = lookup(label)?;
    let (text, _had_errors) = encoding.decode_without_bom_handling(data);
    Ok(text.into_owned())
}

/// Encode text with the named encoding.
///
/// encoding_rs only encodes to ASCII-compatible targets, so the UTF-16 family
/// is serialized here from code units.
pub fn encode_text(text: &str, label: &str) -> Result<Vec<u8>> {
    let encoding = lookup(label)?;
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    let (bytes, _, _unmappable) = encoding.encode(text);
    Ok(bytes.into_owned())
}

/// Decode ASCII bytes; anything above 0x7F becomes U+FFFD.
pub fn decode_ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Encode text as ASCII; non-ASCII characters become '?'.
pub fn encode_ascii(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}
