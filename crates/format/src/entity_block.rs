//! Encoding of a full entity record into a single data-section block.
//!
//! Layout: `created_ns:8, modified_ns:8, tag_count:2, has_content:1,
//! reserved:5` followed by `tag_count` × `tag_id:4` (resolved against a
//! [`TagDictionary`]) and, when `has_content` is set, a content-codec blob.

use crate::content_codec;
use crate::tag_dictionary::TagDictionary;
use byteorder::{ByteOrder, LittleEndian};
use entity_core::entity::Entity;
use entity_core::entity_id::EntityId;
use entity_core::error::{Error, Result};
use entity_core::tag::Tag;
use entity_core::timestamp::Timestamp;

const BLOCK_HEADER_LEN: usize = 24;

/// Encode `entity`'s tags and content, interning tag strings into `dict`.
/// The entity id itself is not part of the block; callers track it via the
/// entity index.
pub fn encode(entity: &Entity, dict: &mut TagDictionary, compression_threshold: usize) -> Result<Vec<u8>> {
    if entity.tags.len() > u16::MAX as usize {
        return Err(Error::Validation(format!(
            "entity has {} tags, exceeding the per-block limit of {}",
            entity.tags.len(),
            u16::MAX
        )));
    }

    let mut buf = vec![0u8; BLOCK_HEADER_LEN];
    LittleEndian::write_u64(&mut buf[0..8], entity.created_at.as_nanos());
    LittleEndian::write_u64(&mut buf[8..16], entity.updated_at.as_nanos());
    LittleEndian::write_u16(&mut buf[16..18], entity.tags.len() as u16);
    buf[18] = entity.content.is_some() as u8;
    // buf[19..24] reserved, left zero.

    for tag in &entity.tags {
        let id = dict.intern(tag.as_str());
        let mut id_buf = [0u8; 4];
        LittleEndian::write_u32(&mut id_buf, id);
        buf.extend_from_slice(&id_buf);
    }

    if let Some(content) = &entity.content {
        let encoded = content_codec::encode(content, compression_threshold)?;
        buf.extend_from_slice(&encoded);
    }

    Ok(buf)
}

/// Decode a block produced by [`encode`] back into a full [`Entity`],
/// resolving tag ids against `dict`.
pub fn decode(buf: &[u8], id: EntityId, dict: &TagDictionary) -> Result<Entity> {
    if buf.len() < BLOCK_HEADER_LEN {
        return Err(Error::Corruption("entity block truncated".into()));
    }
    let created_ns = LittleEndian::read_u64(&buf[0..8]);
    let modified_ns = LittleEndian::read_u64(&buf[8..16]);
    let tag_count = LittleEndian::read_u16(&buf[16..18]) as usize;
    let has_content = buf[18] != 0;

    let tags_start = BLOCK_HEADER_LEN;
    let tags_end = tags_start + tag_count * 4;
    if buf.len() < tags_end {
        return Err(Error::Corruption("entity block tag table truncated".into()));
    }
    let mut tags = Vec::with_capacity(tag_count);
    for i in 0..tag_count {
        let offset = tags_start + i * 4;
        let tag_id = LittleEndian::read_u32(&buf[offset..offset + 4]);
        let raw = dict
            .resolve(tag_id)
            .ok_or_else(|| Error::Corruption(format!("entity block references unknown tag id {tag_id}")))?;
        tags.push(Tag::parse(raw)?);
    }

    let content = if has_content {
        Some(content_codec::decode(&buf[tags_end..])?)
    } else {
        None
    };

    Ok(Entity {
        id,
        tags,
        content,
        created_at: Timestamp::from_nanos(created_ns),
        updated_at: Timestamp::from_nanos(modified_ns),
    })
}
