//! The embedded write-ahead log section of an EUFF file.
//!
//! Unlike a segmented WAL, this log lives inline within the main file at
//! `[wal_offset, wal_offset + wal_size)`. Replay tolerates a truncated final
//! record (a crash mid-append) by treating it as the tail of an
//! otherwise-valid log rather than fatal corruption — this is the "emergency
//! mode" fallback: parse as much as validates, warn about the rest, and let
//! the caller keep running on what was recovered.

use crate::entry::WalEntry;
use crate::op_type::OpType;
use entity_core::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Handle onto the WAL section of an open EUFF file.
pub struct Wal {
    file: File,
    base_offset: u64,
    size: u64,
    next_sequence: u64,
}

impl Wal {
    /// Attach to an existing WAL section spanning `size` bytes starting at
    /// `base_offset`, with sequence numbers resuming from `next_sequence`.
    pub fn open(file: File, base_offset: u64, size: u64, next_sequence: u64) -> Self {
        Wal {
            file,
            base_offset,
            size,
            next_sequence,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Append a CREATE/UPDATE/DELETE record and return the written entry.
    pub fn append(
        &mut self,
        op_type: OpType,
        timestamp_ns: u64,
        entity_id: String,
        payload: Option<crate::entry::EntityPayload>,
    ) -> Result<WalEntry> {
        let entry = WalEntry {
            op_type,
            sequence: self.next_sequence,
            timestamp_ns,
            entity_id,
            payload,
        };
        self.write_entry(&entry)?;
        self.next_sequence += 1;
        Ok(entry)
    }

    /// Append a CHECKPOINT marker, used as a barrier before the engine
    /// rewrites the file with a compacted WAL section.
    pub fn append_checkpoint(&mut self, timestamp_ns: u64) -> Result<WalEntry> {
        let entry = WalEntry::checkpoint(self.next_sequence, timestamp_ns);
        self.write_entry(&entry)?;
        self.next_sequence += 1;
        Ok(entry)
    }

    fn write_entry(&mut self, entry: &WalEntry) -> Result<()> {
        let bytes = entry.to_bytes()?;
        self.file.seek(SeekFrom::Start(self.base_offset + self.size))?;
        self.file.write_all(&bytes)?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Force the written records to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay every record in the log, oldest first. A truncated final
    /// record (the log's tail was cut off by a crash mid-write) is dropped
    /// with a warning rather than failing the whole replay; a corrupt
    /// record anywhere else is a hard error, since the log's append-only
    /// ordering cannot be trusted past that point.
    pub fn replay(&mut self) -> Result<Vec<WalEntry>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.file.seek(SeekFrom::Start(self.base_offset))?;
        let mut buf = vec![0u8; self.size as usize];
        self.file.read_exact(&mut buf)?;

        let mut entries = Vec::new();
        let mut cursor = 0usize;
        while cursor < buf.len() {
            match WalEntry::from_bytes(&buf[cursor..]) {
                Ok((entry, consumed)) => {
                    cursor += consumed;
                    entries.push(entry);
                }
                Err(err) => {
                    if cursor == 0 {
                        return Err(err);
                    }
                    tracing::warn!(
                        bytes_remaining = buf.len() - cursor,
                        error = %err,
                        "WAL tail did not parse cleanly, treating as a crash-truncated record and stopping replay"
                    );
                    break;
                }
            }
        }
        Ok(entries)
    }

    /// Reset the log to empty after a checkpoint has persisted all WAL
    /// entries into the main data section. Does not shrink the underlying
    /// file; the engine's checkpoint rewrite is responsible for that.
    pub fn truncate(&mut self) -> Result<()> {
        self.size = 0;
        Ok(())
    }

    /// True once `size` exceeds the astronomical-size guard — a corrupted
    /// header reporting an implausible WAL section rather than a real log.
    pub fn is_astronomical(size: u64) -> bool {
        size >= entity_core::limits::ASTRONOMICAL_SIZE
    }

    pub fn validate_bounds(&self, file_len: u64) -> Result<()> {
        if Self::is_astronomical(self.size) {
            return Err(Error::Integrity(format!(
                "WAL section size {} is astronomical",
                self.size
            )));
        }
        if self.base_offset.saturating_add(self.size) > file_len {
            return Err(Error::Integrity(format!(
                "WAL section [{}, {}) exceeds file length {}",
                self.base_offset,
                self.base_offset + self.size,
                file_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntityPayload;
    use tempfile::tempfile;

    fn open_empty_wal() -> Wal {
        let file = tempfile().unwrap();
        Wal::open(file, 0, 0, 0)
    }

    #[test]
    fn append_and_replay_roundtrips() {
        let mut wal = open_empty_wal();
        wal.append(
            OpType::Create,
            100,
            "e1".to_string(),
            Some(EntityPayload {
                tags: vec!["100|type:user".to_string()],
                content: None,
            }),
        )
        .unwrap();
        wal.append(OpType::Delete, 200, "e1".to_string(), None).unwrap();

        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].op_type, OpType::Create);
        assert_eq!(entries[1].op_type, OpType::Delete);
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[1].sequence, 1);
    }

    #[test]
    fn empty_wal_replays_to_nothing() {
        let mut wal = open_empty_wal();
        assert!(wal.replay().unwrap().is_empty());
    }

    #[test]
    fn truncate_resets_size_for_fresh_appends() {
        let mut wal = open_empty_wal();
        wal.append(OpType::Create, 1, "e1".to_string(), None).unwrap();
        assert!(wal.size() > 0);
        wal.truncate().unwrap();
        assert_eq!(wal.size(), 0);
    }

    #[test]
    fn replay_recovers_from_truncated_tail_record() {
        let mut wal = open_empty_wal();
        wal.append(OpType::Create, 1, "e1".to_string(), None).unwrap();
        wal.append(OpType::Create, 2, "e2".to_string(), None).unwrap();

        // Simulate a crash mid-write of the second record by truncating the
        // underlying WAL section's reported size.
        wal.size -= 2;

        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity_id, "e1");
    }

    #[test]
    fn sequence_numbers_resume_from_supplied_value() {
        let file = tempfile().unwrap();
        let mut wal = Wal::open(file, 0, 0, 42);
        let entry = wal.append(OpType::Create, 1, "e1".to_string(), None).unwrap();
        assert_eq!(entry.sequence, 42);
        assert_eq!(wal.next_sequence(), 43);
    }
}
