//! The interned tag-string dictionary.
//!
//! `entry_count:u32` followed by `entry_count` × `{id:u32, len:u16, bytes[len]}`.
//! Append-only: once an id is assigned to a string it never changes within a
//! file.

use byteorder::{ByteOrder, LittleEndian};
use entity_core::error::{Error, Result};
use std::collections::HashMap;

/// Bidirectional string↔u32 interning table.
#[derive(Debug, Clone, Default)]
pub struct TagDictionary {
    by_id: Vec<String>,
    by_string: HashMap<String, u32>,
}

impl TagDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `tag`, returning its id. Existing strings return their
    /// original id; the dictionary is append-only.
    pub fn intern(&mut self, tag: &str) -> u32 {
        if let Some(&id) = self.by_string.get(tag) {
            return id;
        }
        let id = self.by_id.len() as u32;
        self.by_id.push(tag.to_string());
        self.by_string.insert(tag.to_string(), id);
        id
    }

    pub fn resolve(&self, id: u32) -> Option<&str> {
        self.by_id.get(id as usize).map(String::as_str)
    }

    pub fn id_of(&self, tag: &str) -> Option<u32> {
        self.by_string.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.by_id.len() * 8);
        let mut count_buf = [0u8; 4];
        LittleEndian::write_u32(&mut count_buf, self.by_id.len() as u32);
        buf.extend_from_slice(&count_buf);
        for (id, tag) in self.by_id.iter().enumerate() {
            let mut id_buf = [0u8; 4];
            LittleEndian::write_u32(&mut id_buf, id as u32);
            buf.extend_from_slice(&id_buf);
            let tag_bytes = tag.as_bytes();
            let mut len_buf = [0u8; 2];
            LittleEndian::write_u16(&mut len_buf, tag_bytes.len() as u16);
            buf.extend_from_slice(&len_buf);
            buf.extend_from_slice(tag_bytes);
        }
        buf
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Ok(Self::new());
        }
        if buf.len() < 4 {
            return Err(Error::Corruption("tag dictionary truncated".into()));
        }
        let count = LittleEndian::read_u32(&buf[0..4]) as usize;
        let mut by_id: Vec<String> = Vec::with_capacity(count);
        let mut by_string = HashMap::with_capacity(count);
        let mut cursor = 4usize;
        for _ in 0..count {
            if buf.len() < cursor + 6 {
                return Err(Error::Corruption("tag dictionary entry truncated".into()));
            }
            let id = LittleEndian::read_u32(&buf[cursor..cursor + 4]) as usize;
            let len = LittleEndian::read_u16(&buf[cursor + 4..cursor + 6]) as usize;
            cursor += 6;
            if buf.len() < cursor + len {
                return Err(Error::Corruption("tag dictionary string truncated".into()));
            }
            let s = std::str::from_utf8(&buf[cursor..cursor + len])
                .map_err(|e| Error::Corruption(format!("tag dictionary is not UTF-8: {e}")))?
                .to_string();
            cursor += len;
            if by_id.len() <= id {
                by_id.resize(id + 1, String::new());
            }
            by_id[id] = s.clone();
            by_string.insert(s, id as u32);
        }
        Ok(TagDictionary { by_id, by_string })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut dict = TagDictionary::new();
        let a = dict.intern("type:user");
        let b = dict.intern("type:user");
        assert_eq!(a, b);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn ids_are_assigned_append_only() {
        let mut dict = TagDictionary::new();
        let a = dict.intern("x");
        let b = dict.intern("y");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        // re-interning x does not reassign
        assert_eq!(dict.intern("x"), 0);
    }

    #[test]
    fn roundtrips_through_bytes() {
        let mut dict = TagDictionary::new();
        dict.intern("type:user");
        dict.intern("status:active");
        dict.intern("checksum:sha256:abcd");

        let bytes = dict.serialize();
        let parsed = TagDictionary::deserialize(&bytes).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.resolve(0), Some("type:user"));
        assert_eq!(parsed.id_of("status:active"), Some(1));
    }

    #[test]
    fn empty_dictionary_roundtrips() {
        let dict = TagDictionary::new();
        let bytes = dict.serialize();
        let parsed = TagDictionary::deserialize(&bytes).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn deserialize_rejects_truncated_entry() {
        let mut dict = TagDictionary::new();
        dict.intern("abc");
        let mut bytes = dict.serialize();
        bytes.truncate(bytes.len() - 1);
        assert!(TagDictionary::deserialize(&bytes).is_err());
    }
}
