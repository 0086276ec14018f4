//! Single-writer append path: encode an entity, append it to the data
//! section, and refresh the entity index + footer. Every caller serializes
//! through `writer_manager.write` (spec §5's lock ordering), so this type
//! assumes exclusive access to the underlying [`EuffFile`] for the
//! duration of each call.

use crate::file::EuffFile;
use entity_core::entity::Entity;
use entity_core::error::Result;
use entity_format::entity_block;
use entity_format::index_entry::{index_flags, IndexEntry};

pub struct Writer<'a> {
    euff: &'a mut EuffFile,
    compression_threshold: usize,
}

impl<'a> Writer<'a> {
    pub fn new(euff: &'a mut EuffFile, compression_threshold: usize) -> Self {
        Writer { euff, compression_threshold }
    }

    /// Encode and append one entity's current state to the data section.
    /// Returns the index entry describing where it landed; callers are
    /// responsible for folding this into the full entity index and calling
    /// [`EuffFile::write_footer`] once all of a batch's entities are
    /// appended.
    pub fn append_entity(&mut self, entity: &Entity) -> Result<IndexEntry> {
        entity.validate()?;
        let block = entity_block::encode(entity, &mut self.euff.dict, self.compression_threshold)?;
        let (offset, size) = self.euff.append_data_block(&block)?;
        let flags = if block_is_compressed(entity, self.compression_threshold) {
            index_flags::COMPRESSED
        } else {
            0
        };
        Ok(IndexEntry {
            entity_id: entity.id.as_str().to_string(),
            offset,
            size,
            flags,
        })
    }
}

/// Whether `entity`'s content, if any, would be gzip-compressed under
/// `threshold` — mirrors `content_codec::encode`'s own decision so the
/// index entry's `COMPRESSED` flag stays informational without re-deriving
/// it from the already-written block bytes.
fn block_is_compressed(entity: &Entity, threshold: usize) -> bool {
    match &entity.content {
        Some(content) => content.len() > threshold,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_core::entity_id::EntityId;
    use entity_core::tag::Tag;
    use tempfile::tempdir;

    #[test]
    fn append_entity_grows_data_section_and_returns_plausible_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        let mut euff = EuffFile::open_or_create(&path).unwrap();

        let entity = Entity::new(
            EntityId::parse("e1").unwrap(),
            vec![Tag::wrap("type:user", 1)],
            Some(b"hello".to_vec()),
        );

        let mut writer = Writer::new(&mut euff, 1024);
        let entry = writer.append_entity(&entity).unwrap();

        assert_eq!(entry.entity_id, "e1");
        assert_eq!(entry.flags, 0);
        assert!(entry.is_plausible(euff.header.data_offset + euff.header.data_size));
    }

    #[test]
    fn large_content_above_threshold_sets_compressed_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        let mut euff = EuffFile::open_or_create(&path).unwrap();

        let entity = Entity::new(
            EntityId::parse("e1").unwrap(),
            vec![],
            Some(vec![b'a'; 4096]),
        );

        let mut writer = Writer::new(&mut euff, 1024);
        let entry = writer.append_entity(&entity).unwrap();
        assert_eq!(entry.flags, index_flags::COMPRESSED);
    }

    #[test]
    fn rejects_entity_failing_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.edb");
        let mut euff = EuffFile::open_or_create(&path).unwrap();

        let huge_tags: Vec<Tag> = (0..entity_core::limits::MAX_TAG_COUNT + 1)
            .map(|i| Tag::wrap("x", i as u64))
            .collect();
        let entity = Entity::new(EntityId::parse("e1").unwrap(), huge_tags, None);

        let mut writer = Writer::new(&mut euff, 1024);
        assert!(writer.append_entity(&entity).is_err());
    }
}
