//! The 128-byte EUFF file header.

use crate::constants::{COMPATIBLE_VERSIONS, CURRENT_VERSION, EUFF_MAGIC, HEADER_SIZE, WAL_RESERVED_BYTES};
use byteorder::{ByteOrder, LittleEndian};
use entity_core::error::{Error, Result};

/// Section offsets/sizes and bookkeeping counters for a single EUFF file.
///
/// ```text
/// [Header 128 B][WAL section][Data section][Tag dictionary][Entity index][Deletion index]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub file_size: u64,
    pub wal_offset: u64,
    pub wal_size: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub tag_dict_offset: u64,
    pub tag_dict_size: u64,
    pub entity_index_offset: u64,
    pub entity_index_size: u64,
    pub entity_count: u64,
    pub last_modified_unix_secs: u64,
    pub wal_sequence: u64,
    pub checkpoint_sequence: u64,
    pub deletion_index_offset: u64,
    pub deletion_index_size: u64,
}

impl Header {
    /// A brand-new, empty file's header. The WAL section gets a fixed
    /// reservation right after the header so the data section that follows
    /// it has a stable starting offset regardless of how much the WAL
    /// grows before the next checkpoint; every other section starts empty
    /// at that same data offset.
    pub fn fresh() -> Self {
        let after_header = HEADER_SIZE as u64;
        let data_start = after_header + WAL_RESERVED_BYTES;
        Header {
            version: CURRENT_VERSION,
            file_size: data_start,
            wal_offset: after_header,
            wal_size: 0,
            data_offset: data_start,
            data_size: 0,
            tag_dict_offset: data_start,
            tag_dict_size: 0,
            entity_index_offset: data_start,
            entity_index_size: 0,
            entity_count: 0,
            last_modified_unix_secs: 0,
            wal_sequence: 0,
            checkpoint_sequence: 0,
            deletion_index_offset: data_start,
            deletion_index_size: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], EUFF_MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        LittleEndian::write_u64(&mut buf[8..16], self.file_size);
        LittleEndian::write_u64(&mut buf[16..24], self.wal_offset);
        LittleEndian::write_u64(&mut buf[24..32], self.wal_size);
        LittleEndian::write_u64(&mut buf[32..40], self.data_offset);
        LittleEndian::write_u64(&mut buf[40..48], self.data_size);
        LittleEndian::write_u64(&mut buf[48..56], self.tag_dict_offset);
        LittleEndian::write_u64(&mut buf[56..64], self.tag_dict_size);
        LittleEndian::write_u64(&mut buf[64..72], self.entity_index_offset);
        LittleEndian::write_u64(&mut buf[72..80], self.entity_index_size);
        LittleEndian::write_u64(&mut buf[80..88], self.entity_count);
        LittleEndian::write_u64(&mut buf[88..96], self.last_modified_unix_secs);
        LittleEndian::write_u64(&mut buf[96..104], self.wal_sequence);
        LittleEndian::write_u64(&mut buf[104..112], self.checkpoint_sequence);
        LittleEndian::write_u64(&mut buf[112..120], self.deletion_index_offset);
        LittleEndian::write_u64(&mut buf[120..128], self.deletion_index_size);
        buf
    }

    /// Parse a header from bytes.
    ///
    /// A short buffer (< [`HEADER_SIZE`]) is not an error here — callers
    /// (the reader) are responsible for treating a short-but-magic-prefixed
    /// file as empty.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Integrity(format!(
                "header buffer too short: {} bytes",
                buf.len()
            )));
        }
        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != EUFF_MAGIC {
            return Err(Error::Integrity(format!(
                "bad magic: expected {EUFF_MAGIC:#x}, found {magic:#x}"
            )));
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if !COMPATIBLE_VERSIONS.contains(&version) {
            return Err(Error::FormatVersion(version));
        }
        Ok(Header {
            version,
            file_size: LittleEndian::read_u64(&buf[8..16]),
            wal_offset: LittleEndian::read_u64(&buf[16..24]),
            wal_size: LittleEndian::read_u64(&buf[24..32]),
            data_offset: LittleEndian::read_u64(&buf[32..40]),
            data_size: LittleEndian::read_u64(&buf[40..48]),
            tag_dict_offset: LittleEndian::read_u64(&buf[48..56]),
            tag_dict_size: LittleEndian::read_u64(&buf[56..64]),
            entity_index_offset: LittleEndian::read_u64(&buf[64..72]),
            entity_index_size: LittleEndian::read_u64(&buf[72..80]),
            entity_count: LittleEndian::read_u64(&buf[80..88]),
            last_modified_unix_secs: LittleEndian::read_u64(&buf[88..96]),
            wal_sequence: LittleEndian::read_u64(&buf[96..104]),
            checkpoint_sequence: LittleEndian::read_u64(&buf[104..112]),
            deletion_index_offset: LittleEndian::read_u64(&buf[112..120]),
            deletion_index_size: LittleEndian::read_u64(&buf[120..128]),
        })
    }

    /// Check the magic bytes only, without validating version — used by the
    /// reader to decide "unknown format" vs "short/empty file".
    pub fn has_valid_magic(buf: &[u8]) -> bool {
        buf.len() >= 4 && LittleEndian::read_u32(&buf[0..4]) == EUFF_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_header_roundtrips() {
        let header = Header::fresh();
        let bytes = header.to_bytes();
        let parsed = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header, parsed);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Header::fresh().to_bytes();
        bytes[0] = 0;
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = Header::fresh().to_bytes();
        LittleEndian::write_u32(&mut bytes[4..8], 99);
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(Error::FormatVersion(99))
        ));
    }

    #[test]
    fn accepts_version_two_for_backward_compat() {
        let mut bytes = Header::fresh().to_bytes();
        LittleEndian::write_u32(&mut bytes[4..8], 2);
        let parsed = Header::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, 2);
    }

    #[test]
    fn short_buffer_is_an_error_not_panic() {
        let short = [0u8; 10];
        assert!(Header::from_bytes(&short).is_err());
    }

    #[test]
    fn partial_header_with_valid_magic_is_detected() {
        let bytes = Header::fresh().to_bytes();
        let partial = &bytes[0..64];
        assert!(Header::has_valid_magic(partial));
        assert!(Header::from_bytes(partial).is_err());
    }
}
