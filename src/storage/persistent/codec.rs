//! On-disk framing for state files.
//!
//! A state file is a header followed by one frame:
//!
//! ```text
//! [magic: "SCST"][header version: 1 byte]
//! [frame version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes opening every state file.
pub const MAGIC: [u8; 4] = *b"SCST";

/// Upper bound accepted for a single frame.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

fn invalid(message: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, message)
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes a value into a checksummed frame.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    let len = u32::try_from(data.len())
        .map_err(|_| invalid(format!("frame of {} bytes does not fit a u32 length", data.len())))?;

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());
    Ok(out)
}

/// Reads one frame and deserializes it, verifying the checksum.
///
/// # Errors
/// - Unsupported frame version
/// - Frame longer than `max_len`
/// - Checksum mismatch (corruption)
/// - JSON that does not match `T`
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read, max_len: usize) -> IoResult<T> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported codec version: {} (expected {CODEC_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > max_len {
        return Err(invalid(format!("frame size {len} exceeds maximum {max_len}")));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    serde_json::from_slice(&data).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes the file header.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])
}

/// Reads and checks the file header, returning its version.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(invalid(format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}")));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    Ok(version[0])
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_frame_roundtrip_json_value() {
        let value = json!({"mode": "adaptive", "consecutive_static_failures": 1});
        let encoded = encode(&value).unwrap();
        let decoded: Value = decode(&mut Cursor::new(encoded), MAX_FRAME_SIZE).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode(&json!(["10♦️", "♠️"])).unwrap();
        encoded[7] ^= 0xFF;
        let err = decode::<Value>(&mut Cursor::new(encoded), MAX_FRAME_SIZE).unwrap_err();
        assert!(err.to_string().contains("CRC"));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut bad = vec![CODEC_VERSION];
        bad.extend_from_slice(&1024u32.to_le_bytes());
        let err = decode::<Value>(&mut Cursor::new(bad), 16).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_header_checks_magic() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), CODEC_VERSION);

        let err = read_header(&mut Cursor::new(b"NOPE\x01".to_vec())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
