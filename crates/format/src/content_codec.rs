//! Unified content codec: every stored entity's content blob goes through a
//! single encode/decode path, compressed or not.
//!
//! Wire layout: `compression:1, original_size:4, compressed_size:4, payload[compressed_size]`.

use byteorder::{ByteOrder, LittleEndian};
use entity_core::error::{Error, Result};
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Read;

const HEADER_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompressionKind {
    Raw = 0,
    Gzip = 1,
}

impl CompressionKind {
    fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(CompressionKind::Raw),
            1 => Ok(CompressionKind::Gzip),
            other => Err(Error::Corruption(format!("unknown content compression kind {other}"))),
        }
    }
}

/// Encode `content`, gzip-compressing when it is strictly more than
/// `threshold_bytes` long and compression actually shrinks it.
pub fn encode(content: &[u8], threshold_bytes: usize) -> Result<Vec<u8>> {
    let (kind, payload) = if content.len() > threshold_bytes {
        let mut encoder = GzEncoder::new(content, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| Error::Integrity(format!("gzip compression failed: {e}")))?;
        if compressed.len() < content.len() {
            (CompressionKind::Gzip, compressed)
        } else {
            (CompressionKind::Raw, content.to_vec())
        }
    } else {
        (CompressionKind::Raw, content.to_vec())
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(kind as u8);
    let mut original_size_buf = [0u8; 4];
    LittleEndian::write_u32(&mut original_size_buf, content.len() as u32);
    buf.extend_from_slice(&original_size_buf);
    let mut compressed_size_buf = [0u8; 4];
    LittleEndian::write_u32(&mut compressed_size_buf, payload.len() as u32);
    buf.extend_from_slice(&compressed_size_buf);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a content blob produced by [`encode`].
pub fn decode(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Corruption("content block truncated".into()));
    }
    let kind = CompressionKind::from_u8(buf[0])?;
    let original_size = LittleEndian::read_u32(&buf[1..5]) as usize;
    let compressed_size = LittleEndian::read_u32(&buf[5..9]) as usize;
    if buf.len() < HEADER_LEN + compressed_size {
        return Err(Error::Corruption("content payload truncated".into()));
    }
    let payload = &buf[HEADER_LEN..HEADER_LEN + compressed_size];
    match kind {
        CompressionKind::Raw => Ok(payload.to_vec()),
        CompressionKind::Gzip => {
            let mut decoder = GzDecoder::new(payload);
            let mut out = Vec::with_capacity(original_size);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::Corruption(format!("gzip decompression failed: {e}")))?;
            Ok(out)
        }
    }
}

/// Bounded, lossy UTF-8 decode of decompressed content, for content indexing
/// that must tolerate binary payloads.
pub fn decode_for_search(buf: &[u8], max_bytes: usize) -> Result<String> {
    let decoded = decode(buf)?;
    let bounded = if decoded.len() > max_bytes {
        &decoded[..max_bytes]
    } else {
        &decoded[..]
    };
    Ok(String::from_utf8_lossy(bounded).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_content_stays_raw() {
        let content = b"short";
        let encoded = encode(content, 1024).unwrap();
        assert_eq!(encoded[0], CompressionKind::Raw as u8);
        assert_eq!(decode(&encoded).unwrap(), content);
    }

    #[test]
    fn content_exactly_at_threshold_stays_raw() {
        let content = vec![b'a'; 1024];
        let encoded = encode(&content, 1024).unwrap();
        assert_eq!(encoded[0], CompressionKind::Raw as u8);
        assert_eq!(decode(&encoded).unwrap(), content);
    }

    #[test]
    fn large_compressible_content_is_gzipped() {
        let content = vec![b'a'; 4096];
        let encoded = encode(&content, 1024).unwrap();
        assert_eq!(encoded[0], CompressionKind::Gzip as u8);
        assert_eq!(decode(&encoded).unwrap(), content);
    }

    #[test]
    fn incompressible_content_above_threshold_falls_back_to_raw() {
        // Random-looking bytes that gzip cannot shrink meaningfully.
        let content: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let encoded = encode(&content, 1024).unwrap();
        assert_eq!(decode(&encoded).unwrap(), content);
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut encoded = encode(b"hello world", 1024).unwrap();
        encoded.truncate(encoded.len() - 1);
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn search_decode_truncates_to_bound() {
        let content = vec![b'x'; 100];
        let encoded = encode(&content, 1024).unwrap();
        let text = decode_for_search(&encoded, 10).unwrap();
        assert_eq!(text.len(), 10);
    }
}
