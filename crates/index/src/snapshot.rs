//! Persisted on-disk snapshot of the sharded tag index (`entities.edb.idx`):
//! `{tag -> [entity_ids]}`. Letting startup load this instead of reindexing
//! from scratch is an optimization; staleness or corruption falls back to
//! a full rebuild.

use crate::sharded_tag_index::ShardedTagIndex;
use entity_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// Index considered stale if it predates the data file by more than this.
const STALENESS_THRESHOLD: Duration = Duration::from_secs(120);
/// A data file at least this large with a suspiciously small index is
/// treated as stale even if the mtimes look fine.
const LARGE_DATA_BYTES: u64 = 100 * 1024 * 1024;
const SMALL_INDEX_BYTES: u64 = 100 * 1024;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TagIndexSnapshot {
    pub tags: BTreeMap<String, Vec<String>>,
}

impl TagIndexSnapshot {
    pub fn from_index(index: &ShardedTagIndex) -> Self {
        let mut tags = BTreeMap::new();
        for tag in index.all_tags() {
            tags.insert(tag.clone(), index.get(&tag));
        }
        TagIndexSnapshot { tags }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        serde_json::from_slice(buf)
            .map_err(|e| Error::corruption(format!("tag index snapshot is malformed: {e}")))
    }

    pub fn apply(&self, index: &ShardedTagIndex) {
        for (tag, ids) in &self.tags {
            for id in ids {
                index.add_tag(tag, id);
            }
        }
    }
}

/// Staleness heuristics from spec §4.10/§6.
pub fn is_stale(
    data_modified: SystemTime,
    index_modified: SystemTime,
    data_size: u64,
    index_size: u64,
) -> bool {
    if let Ok(age) = data_modified.duration_since(index_modified) {
        if age > STALENESS_THRESHOLD {
            return true;
        }
    }
    data_size > LARGE_DATA_BYTES && index_size < SMALL_INDEX_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let index = ShardedTagIndex::new();
        index.add_tag("status:active", "e1");
        let snapshot = TagIndexSnapshot::from_index(&index);
        let bytes = snapshot.to_bytes().unwrap();
        let parsed = TagIndexSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.tags.get("status:active"), Some(&vec!["e1".to_string()]));
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(TagIndexSnapshot::from_bytes(b"not json").is_err());
    }

    #[test]
    fn stale_when_index_much_older_than_data() {
        let now = SystemTime::now();
        let old = now - Duration::from_secs(200);
        assert!(is_stale(now, old, 100, 100));
        assert!(!is_stale(old, now, 100, 100));
    }

    #[test]
    fn stale_when_index_suspiciously_small_for_large_data() {
        let now = SystemTime::now();
        assert!(is_stale(now, now, LARGE_DATA_BYTES + 1, SMALL_INDEX_BYTES - 1));
        assert!(!is_stale(now, now, LARGE_DATA_BYTES + 1, SMALL_INDEX_BYTES + 1));
    }

    #[test]
    fn apply_restores_direct_lookup() {
        let mut tags = BTreeMap::new();
        tags.insert("status:active".to_string(), vec!["e1".to_string()]);
        let snapshot = TagIndexSnapshot { tags };
        let index = ShardedTagIndex::new();
        snapshot.apply(&index);
        assert_eq!(index.get("status:active"), vec!["e1".to_string()]);
    }
}
