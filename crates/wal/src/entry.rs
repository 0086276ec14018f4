//! Self-delimiting, checksummed WAL records.
//!
//! On-disk shape of one record:
//!
//! ```text
//! length:4 | op_type:1 | sequence:8 | timestamp_ns:8 | entity_id_len:2 | entity_id
//!          | has_payload:1 | [tag_count:2 | (tag_len:2 | tag_bytes)* | content_len:4 | content]
//!          | crc32:4
//! ```
//!
//! `length` covers everything between itself and the trailing CRC, inclusive
//! of the CRC. `content_len` of `u32::MAX` means "no content" so a present
//! empty content blob is distinguishable from an absent one.

use crate::op_type::OpType;
use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;
use entity_core::error::{Error, Result};
use entity_core::limits::ASTRONOMICAL_SIZE;

const NO_CONTENT: u32 = u32::MAX;

/// The tags-and-content payload of a create/update WAL entry. Tags are
/// stored as raw temporal strings, not dictionary ids — replay must work
/// before any tag dictionary exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPayload {
    pub tags: Vec<String>,
    pub content: Option<Vec<u8>>,
}

/// One WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    pub op_type: OpType,
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub entity_id: String,
    pub payload: Option<EntityPayload>,
}

impl WalEntry {
    pub fn checkpoint(sequence: u64, timestamp_ns: u64) -> Self {
        WalEntry {
            op_type: OpType::Checkpoint,
            sequence,
            timestamp_ns,
            entity_id: String::new(),
            payload: None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.entity_id.len() > u16::MAX as usize {
            return Err(Error::Validation("entity id too long for WAL record".into()));
        }

        let mut payload_bytes = Vec::new();
        payload_bytes.push(self.op_type.as_u8());
        let mut u64_buf = [0u8; 8];
        LittleEndian::write_u64(&mut u64_buf, self.sequence);
        payload_bytes.extend_from_slice(&u64_buf);
        LittleEndian::write_u64(&mut u64_buf, self.timestamp_ns);
        payload_bytes.extend_from_slice(&u64_buf);

        let id_bytes = self.entity_id.as_bytes();
        let mut u16_buf = [0u8; 2];
        LittleEndian::write_u16(&mut u16_buf, id_bytes.len() as u16);
        payload_bytes.extend_from_slice(&u16_buf);
        payload_bytes.extend_from_slice(id_bytes);

        match &self.payload {
            None => payload_bytes.push(0),
            Some(entity_payload) => {
                payload_bytes.push(1);
                if entity_payload.tags.len() > u16::MAX as usize {
                    return Err(Error::Validation("too many tags for a single WAL record".into()));
                }
                LittleEndian::write_u16(&mut u16_buf, entity_payload.tags.len() as u16);
                payload_bytes.extend_from_slice(&u16_buf);
                for tag in &entity_payload.tags {
                    let bytes = tag.as_bytes();
                    LittleEndian::write_u16(&mut u16_buf, bytes.len() as u16);
                    payload_bytes.extend_from_slice(&u16_buf);
                    payload_bytes.extend_from_slice(bytes);
                }
                let mut u32_buf = [0u8; 4];
                match &entity_payload.content {
                    None => {
                        LittleEndian::write_u32(&mut u32_buf, NO_CONTENT);
                        payload_bytes.extend_from_slice(&u32_buf);
                    }
                    Some(content) => {
                        if content.len() as u64 >= ASTRONOMICAL_SIZE {
                            return Err(Error::Integrity(format!(
                                "WAL content length {} is astronomical",
                                content.len()
                            )));
                        }
                        LittleEndian::write_u32(&mut u32_buf, content.len() as u32);
                        payload_bytes.extend_from_slice(&u32_buf);
                        payload_bytes.extend_from_slice(content);
                    }
                }
            }
        }

        let crc = {
            let mut hasher = Hasher::new();
            hasher.update(&payload_bytes);
            hasher.finalize()
        };

        let total_len = payload_bytes.len() + 4;
        if total_len as u64 >= ASTRONOMICAL_SIZE {
            return Err(Error::Integrity(format!(
                "WAL record length {total_len} is astronomical"
            )));
        }

        let mut record = Vec::with_capacity(4 + total_len);
        let mut len_buf = [0u8; 4];
        LittleEndian::write_u32(&mut len_buf, total_len as u32);
        record.extend_from_slice(&len_buf);
        record.extend_from_slice(&payload_bytes);
        let mut crc_buf = [0u8; 4];
        LittleEndian::write_u32(&mut crc_buf, crc);
        record.extend_from_slice(&crc_buf);
        Ok(record)
    }

    /// Parse one record from the front of `buf`. Returns the entry and the
    /// number of bytes consumed. A `length` field at or above
    /// [`ASTRONOMICAL_SIZE`] is rejected immediately, before any attempt to
    /// read that many bytes, since it can only be corruption.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 4 {
            return Err(Error::Corruption("WAL record too short to contain a length prefix".into()));
        }
        let length = LittleEndian::read_u32(&buf[0..4]) as u64;
        if length >= ASTRONOMICAL_SIZE {
            return Err(Error::Integrity(format!("WAL record claims astronomical length {length}")));
        }
        let length = length as usize;
        if length < 4 {
            return Err(Error::Corruption("WAL record length too small for its CRC trailer".into()));
        }
        if buf.len() < 4 + length {
            return Err(Error::Corruption("WAL record truncated".into()));
        }

        let payload_and_crc = &buf[4..4 + length];
        let payload = &payload_and_crc[..length - 4];
        let stored_crc = LittleEndian::read_u32(&payload_and_crc[length - 4..]);
        let computed_crc = {
            let mut hasher = Hasher::new();
            hasher.update(payload);
            hasher.finalize()
        };
        if stored_crc != computed_crc {
            return Err(Error::Corruption(format!(
                "WAL record checksum mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"
            )));
        }

        if payload.len() < 18 {
            return Err(Error::Corruption("WAL record payload too short".into()));
        }
        let op_type = OpType::from_u8(payload[0])?;
        let sequence = LittleEndian::read_u64(&payload[1..9]);
        let timestamp_ns = LittleEndian::read_u64(&payload[9..17]);
        let id_len = LittleEndian::read_u16(&payload[17..19]) as usize;
        let mut cursor = 19usize;
        if payload.len() < cursor + id_len {
            return Err(Error::Corruption("WAL record entity id truncated".into()));
        }
        let entity_id = std::str::from_utf8(&payload[cursor..cursor + id_len])
            .map_err(|e| Error::Corruption(format!("WAL entity id is not UTF-8: {e}")))?
            .to_string();
        cursor += id_len;

        if payload.len() <= cursor {
            return Err(Error::Corruption("WAL record missing payload marker".into()));
        }
        let has_payload = payload[cursor];
        cursor += 1;

        let entity_payload = if has_payload == 0 {
            None
        } else {
            if payload.len() < cursor + 2 {
                return Err(Error::Corruption("WAL record tag count truncated".into()));
            }
            let tag_count = LittleEndian::read_u16(&payload[cursor..cursor + 2]) as usize;
            cursor += 2;
            let mut tags = Vec::with_capacity(tag_count);
            for _ in 0..tag_count {
                if payload.len() < cursor + 2 {
                    return Err(Error::Corruption("WAL record tag length truncated".into()));
                }
                let tag_len = LittleEndian::read_u16(&payload[cursor..cursor + 2]) as usize;
                cursor += 2;
                if payload.len() < cursor + tag_len {
                    return Err(Error::Corruption("WAL record tag bytes truncated".into()));
                }
                let tag = std::str::from_utf8(&payload[cursor..cursor + tag_len])
                    .map_err(|e| Error::Corruption(format!("WAL tag is not UTF-8: {e}")))?
                    .to_string();
                tags.push(tag);
                cursor += tag_len;
            }
            if payload.len() < cursor + 4 {
                return Err(Error::Corruption("WAL record content length truncated".into()));
            }
            let content_len = LittleEndian::read_u32(&payload[cursor..cursor + 4]);
            cursor += 4;
            let content = if content_len == NO_CONTENT {
                None
            } else {
                let content_len = content_len as usize;
                if payload.len() < cursor + content_len {
                    return Err(Error::Corruption("WAL record content truncated".into()));
                }
                Some(payload[cursor..cursor + content_len].to_vec())
            };
            Some(EntityPayload { tags, content })
        };

        Ok((
            WalEntry {
                op_type,
                sequence,
                timestamp_ns,
                entity_id,
                payload: entity_payload,
            },
            4 + length,
        ))
    }
}
