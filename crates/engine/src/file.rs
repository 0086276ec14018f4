//! Low-level section I/O for an open EUFF file: header, tag dictionary,
//! entity index and deletion index, plus appending blocks to the data
//! section. The embedded WAL itself lives in `entity-wal`; this module
//! only manages the sections around it.
//!
//! Layout: `[Header 128B][WAL][Data][TagDict][EntityIndex][DeletionIndex]`.
//! The trailing three sections are small relative to the data section, so
//! rather than track their shifting offsets incrementally, this module
//! rewrites all three as one "footer" after every data-section append.
//! That keeps the data section strictly append-only (required for the
//! WAL-before-data ordering guarantee) while keeping footer bookkeeping a
//! single atomic step.

use entity_core::error::{Error, Result};
use entity_core::limits::ASTRONOMICAL_SIZE;
use entity_format::constants::{DELETION_ENTRY_SIZE, HEADER_SIZE, INDEX_ENTRY_SIZE};
use entity_format::deletion_entry::DeletionEntry;
use entity_format::header::Header;
use entity_format::index_entry::IndexEntry;
use entity_format::tag_dictionary::TagDictionary;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct EuffFile {
    path: PathBuf,
    file: File,
    pub header: Header,
    pub dict: TagDictionary,
}

impl EuffFile {
    /// Open an existing EUFF file, or create a fresh one if it does not
    /// exist or is empty.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: PathBuf, mut file: File) -> Result<Self> {
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            let header = Header::fresh();
            let mut euff = EuffFile { path, file, header, dict: TagDictionary::new() };
            euff.write_header()?;
            return Ok(euff);
        }

        let mut header_buf = vec![0u8; (HEADER_SIZE as u64).min(file_len) as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_buf)?;

        if header_buf.len() < HEADER_SIZE {
            if Header::has_valid_magic(&header_buf) {
                let header = Header::fresh();
                let mut euff = EuffFile { path, file, header, dict: TagDictionary::new() };
                euff.write_header()?;
                return Ok(euff);
            }
            return Err(Error::integrity("file too short to contain a valid header"));
        }

        let header = Header::from_bytes(&header_buf)?;
        let dict_bytes = read_section(&mut file, header.tag_dict_offset, header.tag_dict_size)?;
        let dict = TagDictionary::deserialize(&dict_bytes)?;
        Ok(EuffFile { path, file, header, dict })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn read_section(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        read_section(&mut self.file, offset, size)
    }

    pub fn read_entity_index(&mut self) -> Result<Vec<IndexEntry>> {
        let bytes = self.read_section(self.header.entity_index_offset, self.header.entity_index_size)?;
        parse_fixed_records(&bytes, INDEX_ENTRY_SIZE, IndexEntry::from_bytes)
    }

    pub fn read_deletion_index(&mut self) -> Result<Vec<DeletionEntry>> {
        let bytes = self.read_section(self.header.deletion_index_offset, self.header.deletion_index_size)?;
        parse_fixed_records(&bytes, DELETION_ENTRY_SIZE, DeletionEntry::from_bytes)
    }

    /// Append one pre-encoded entity block to the end of the data section.
    /// Returns the block's `(offset, size)`.
    pub fn append_data_block(&mut self, block: &[u8]) -> Result<(u64, u32)> {
        if block.len() as u64 >= ASTRONOMICAL_SIZE {
            return Err(Error::integrity(format!("entity block of {} bytes is astronomical", block.len())));
        }
        let offset = self.header.data_offset + self.header.data_size;
        if offset >= ASTRONOMICAL_SIZE * 4 {
            return Err(Error::integrity(format!("data write offset {offset} is astronomical")));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(block)?;
        let written = block.len() as u32;
        self.header.data_size += written as u64;
        Ok((offset, written))
    }

    /// Rewrite the tag dictionary, entity index and deletion index
    /// sections immediately after the current data section, update the
    /// header's offsets/sizes to match, and persist the header. Leaves
    /// the data section itself untouched.
    pub fn write_footer(&mut self, entity_index: &[IndexEntry], deletions: &[DeletionEntry]) -> Result<()> {
        let dict_bytes = self.dict.serialize();
        let dict_offset = self.header.data_offset + self.header.data_size;
        self.file.seek(SeekFrom::Start(dict_offset))?;
        self.file.write_all(&dict_bytes)?;

        let index_offset = dict_offset + dict_bytes.len() as u64;
        self.file.seek(SeekFrom::Start(index_offset))?;
        let mut index_bytes = Vec::with_capacity(entity_index.len() * INDEX_ENTRY_SIZE);
        for entry in entity_index {
            index_bytes.extend_from_slice(&entry.to_bytes()?);
        }
        self.file.write_all(&index_bytes)?;

        let deletion_offset = index_offset + index_bytes.len() as u64;
        self.file.seek(SeekFrom::Start(deletion_offset))?;
        let mut deletion_bytes = Vec::with_capacity(deletions.len() * DELETION_ENTRY_SIZE);
        for entry in deletions {
            deletion_bytes.extend_from_slice(&entry.to_bytes()?);
        }
        self.file.write_all(&deletion_bytes)?;

        let file_size = deletion_offset + deletion_bytes.len() as u64;
        self.file.set_len(file_size)?;

        self.header.tag_dict_offset = dict_offset;
        self.header.tag_dict_size = dict_bytes.len() as u64;
        self.header.entity_index_offset = index_offset;
        self.header.entity_index_size = index_bytes.len() as u64;
        self.header.deletion_index_offset = deletion_offset;
        self.header.deletion_index_size = deletion_bytes.len() as u64;
        self.header.entity_count = entity_index.len() as u64;
        self.header.file_size = file_size;
        self.header.last_modified_unix_secs = unix_secs_now();

        self.write_header()
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// A second, independent read-write handle on the same path, for the
    /// WAL to own. Kept separate from `self.file` so the writer's data
    /// appends and the WAL's own appends never share a seek position.
    pub fn reopen_for_wal(&self) -> Result<File> {
        OpenOptions::new().read(true).write(true).open(&self.path)
    }
}

fn read_section(file: &mut File, offset: u64, size: u64) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; size as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn parse_fixed_records<T>(bytes: &[u8], record_size: usize, parse: impl Fn(&[u8]) -> Result<T>) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(bytes.len() / record_size.max(1));
    let mut cursor = 0;
    while cursor + record_size <= bytes.len() {
        out.push(parse(&bytes[cursor..cursor + record_size])?);
        cursor += record_size;
    }
    Ok(out)
}

fn unix_secs_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_format::index_entry::IndexEntry;
    use tempfile::tempdir;

    #[test]
    fn fresh_file_has_empty_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        let euff = EuffFile::open_or_create(&path).unwrap();
        assert_eq!(euff.header.entity_count, 0);
        assert_eq!(euff.header.data_size, 0);
    }

    #[test]
    fn append_data_then_write_footer_roundtrips_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        let mut euff = EuffFile::open_or_create(&path).unwrap();

        euff.dict.intern("100|type:user");
        let (offset, size) = euff.append_data_block(&[1, 2, 3, 4]).unwrap();
        assert_eq!(offset, euff.header.data_offset);
        assert_eq!(size, 4);

        let entry = IndexEntry { entity_id: "e1".to_string(), offset, size, flags: 0 };
        euff.write_footer(&[entry], &[]).unwrap();
        euff.sync().unwrap();
        drop(euff);

        let mut reopened = EuffFile::open_or_create(&path).unwrap();
        assert_eq!(reopened.header.entity_count, 1);
        let entries = reopened.read_entity_index().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity_id, "e1");
        assert_eq!(reopened.dict.resolve(0), Some("100|type:user"));
    }

    #[test]
    fn short_but_magic_prefixed_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        {
            let mut euff = EuffFile::open_or_create(&path).unwrap();
            euff.write_footer(&[], &[]).unwrap();
        }
        // Truncate to a short-but-magic-prefixed prefix of the header.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(32).unwrap();
        drop(file);

        let reopened = EuffFile::open_or_create(&path).unwrap();
        assert_eq!(reopened.header.entity_count, 0);
    }
}
