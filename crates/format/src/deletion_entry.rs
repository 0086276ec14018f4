//! Deletion index records: 256-byte entries tracking entity lifecycle state.
//!
//! Layout: `entity_id[96], deleted_at_ns:8, reason_len:4, flags:4,
//! checksum[32], reason[64], reserved[32], lifecycle_state:2, pad[14]`.

use crate::constants::DELETION_ENTRY_SIZE;
use crate::padded_id::{read_padded_id, write_padded_id};
use byteorder::{ByteOrder, LittleEndian};
use entity_core::error::{Error, Result};

/// Lifecycle state of a deleted (or formerly-deleted) entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active = 0,
    SoftDeleted = 1,
    Archived = 2,
    Purged = 3,
}

impl LifecycleState {
    fn from_u16(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(LifecycleState::Active),
            1 => Ok(LifecycleState::SoftDeleted),
            2 => Ok(LifecycleState::Archived),
            3 => Ok(LifecycleState::Purged),
            other => Err(Error::Corruption(format!(
                "unknown deletion lifecycle state {other}"
            ))),
        }
    }
}

/// A single record in the deletion index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEntry {
    pub entity_id: String,
    pub deleted_at_ns: u64,
    pub reason: String,
    pub checksum: [u8; 32],
    pub lifecycle_state: u16,
}

impl DeletionEntry {
    pub fn soft_delete(entity_id: String, deleted_at_ns: u64, checksum: [u8; 32]) -> Self {
        DeletionEntry {
            entity_id,
            deleted_at_ns,
            reason: String::new(),
            checksum,
            lifecycle_state: LifecycleState::SoftDeleted as u16,
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; DELETION_ENTRY_SIZE]> {
        let mut buf = [0u8; DELETION_ENTRY_SIZE];
        write_padded_id(&self.entity_id, &mut buf[0..96])?;
        LittleEndian::write_u64(&mut buf[96..104], self.deleted_at_ns);
        let reason_bytes = self.reason.as_bytes();
        if reason_bytes.len() > 64 {
            return Err(Error::Validation("deletion reason exceeds 64 bytes".into()));
        }
        LittleEndian::write_u32(&mut buf[104..108], reason_bytes.len() as u32);
        // flags[108..112] reserved, left zero.
        buf[112..144].copy_from_slice(&self.checksum);
        buf[144..144 + reason_bytes.len()].copy_from_slice(reason_bytes);
        // reserved[208..240] left zero.
        LittleEndian::write_u16(&mut buf[240..242], self.lifecycle_state);
        Ok(buf)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < DELETION_ENTRY_SIZE {
            return Err(Error::Corruption("deletion entry truncated".into()));
        }
        let entity_id = read_padded_id(&buf[0..96])?;
        let deleted_at_ns = LittleEndian::read_u64(&buf[96..104]);
        let reason_len = LittleEndian::read_u32(&buf[104..108]) as usize;
        if reason_len > 64 {
            return Err(Error::Corruption("deletion reason length out of bounds".into()));
        }
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&buf[112..144]);
        let reason = std::str::from_utf8(&buf[144..144 + reason_len])
            .map_err(|e| Error::Corruption(format!("deletion reason is not UTF-8: {e}")))?
            .to_string();
        let lifecycle_state = LittleEndian::read_u16(&buf[240..242]);
        LifecycleState::from_u16(lifecycle_state)?;
        Ok(DeletionEntry {
            entity_id,
            deleted_at_ns,
            reason,
            checksum,
            lifecycle_state,
        })
    }

    pub fn state(&self) -> Result<LifecycleState> {
        LifecycleState::from_u16(self.lifecycle_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let entry = DeletionEntry {
            entity_id: "abc".to_string(),
            deleted_at_ns: 123_456_789,
            reason: "manual deletion".to_string(),
            checksum: [7u8; 32],
            lifecycle_state: LifecycleState::SoftDeleted as u16,
        };
        let bytes = entry.to_bytes().unwrap();
        let parsed = DeletionEntry::from_bytes(&bytes).unwrap();
        assert_eq!(entry, parsed);
        assert_eq!(parsed.state().unwrap(), LifecycleState::SoftDeleted);
    }

    #[test]
    fn rejects_oversize_reason() {
        let entry = DeletionEntry {
            entity_id: "abc".to_string(),
            deleted_at_ns: 0,
            reason: "x".repeat(100),
            checksum: [0u8; 32],
            lifecycle_state: 0,
        };
        assert!(entry.to_bytes().is_err());
    }

    #[test]
    fn rejects_unknown_lifecycle_state() {
        let mut entry = DeletionEntry::soft_delete("abc".to_string(), 0, [0u8; 32]);
        entry.lifecycle_state = 99;
        let bytes = entry.to_bytes().unwrap();
        assert!(DeletionEntry::from_bytes(&bytes).is_err());
    }
}
