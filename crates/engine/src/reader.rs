//! Read-only handles onto an EUFF file and a small pool of them.
//!
//! Readers hold their own file descriptor and a snapshot of the tag
//! dictionary taken at open time, so concurrent reads never contend with
//! the writer's single file handle. Because a footer rewrite can move the
//! tag dictionary and shift block offsets are stable (data is append-only)
//! but the dictionary snapshot goes stale, the pool is drained after every
//! write or checkpoint and readers are recreated lazily on next use.

use entity_core::entity::Entity;
use entity_core::entity_id::EntityId;
use entity_core::error::Result;
use entity_format::entity_block;
use entity_format::header::Header;
use entity_format::tag_dictionary::TagDictionary;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

pub struct Reader {
    file: File,
    dict: TagDictionary,
}

impl Reader {
    pub fn open(path: &Path, header: &Header) -> Result<Self> {
        let mut file = File::open(path)?;
        let dict_bytes = read_at(&mut file, header.tag_dict_offset, header.tag_dict_size)?;
        let dict = TagDictionary::deserialize(&dict_bytes)?;
        Ok(Reader { file, dict })
    }

    pub fn read_entity(&mut self, id: &EntityId, offset: u64, size: u32) -> Result<Entity> {
        let block = read_at(&mut self.file, offset, size as u64)?;
        entity_block::decode(&block, id.clone(), &self.dict)
    }
}

fn read_at(file: &mut File, offset: u64, size: u64) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; size as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

const POOL_CAPACITY: usize = 8;

/// Small LIFO pool of [`Reader`]s. `with_reader` borrows one (creating it
/// if the pool is empty) and returns it to the pool on success.
#[derive(Default)]
pub struct ReaderPool {
    idle: Mutex<Vec<Reader>>,
}

impl ReaderPool {
    pub fn new() -> Self {
        ReaderPool { idle: Mutex::new(Vec::new()) }
    }

    pub fn with_reader<T>(
        &self,
        path: &Path,
        header: &Header,
        f: impl FnOnce(&mut Reader) -> Result<T>,
    ) -> Result<T> {
        let mut reader = match self.idle.lock().unwrap().pop() {
            Some(reader) => reader,
            None => Reader::open(path, header)?,
        };
        let result = f(&mut reader);
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < POOL_CAPACITY {
            idle.push(reader);
        }
        result
    }

    /// Drop every pooled reader, forcing the next `with_reader` call to
    /// open fresh ones against the current header and tag dictionary.
    pub fn drain(&self) {
        self.idle.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
