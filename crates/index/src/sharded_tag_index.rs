//! `tag -> {entity ids}`, partitioned across a fixed number of independently
//! locked shards so writes to disjoint tags never contend.
//!
//! Stores both representations of a tag per spec invariant: the full
//! temporal key (`"<nanos>|<body>"`) and the clean body alone. Storing the
//! body directly (not just via the variant cache) means a persisted
//! snapshot of this index alone is enough to answer `list_by_tag(body)`
//! correctly, even before the variant cache is warmed back up.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default shard count. A power of two keeps the modulo cheap; 64 is the
/// size the spec calls out as a reasonable implementation choice.
pub const DEFAULT_SHARD_COUNT: usize = 64;

struct Shard {
    tags: RwLock<FxHashMap<String, FxHashSet<String>>>,
}

/// Sharded `tag -> entity ids` map.
pub struct ShardedTagIndex {
    shards: Vec<Shard>,
}

impl ShardedTagIndex {
    pub fn new() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    pub fn with_shard_count(count: usize) -> Self {
        let count = count.max(1);
        let shards = (0..count)
            .map(|_| Shard {
                tags: RwLock::new(FxHashMap::default()),
            })
            .collect();
        ShardedTagIndex { shards }
    }

    fn shard_for(&self, tag: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        tag.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    pub fn add_tag(&self, tag: &str, id: &str) {
        let shard = self.shard_for(tag);
        shard
            .tags
            .write()
            .entry(tag.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn remove_tag(&self, tag: &str, id: &str) {
        let shard = self.shard_for(tag);
        let mut map = shard.tags.write();
        if let Some(set) = map.get_mut(tag) {
            set.remove(id);
            if set.is_empty() {
                map.remove(tag);
            }
        }
    }

    pub fn get(&self, tag: &str) -> Vec<String> {
        let shard = self.shard_for(tag);
        shard
            .tags
            .read()
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `id` appears under any tag in any shard. Scans shards
    /// independently; each shard's lock is held only for its own scan.
    pub fn has_entity(&self, id: &str) -> bool {
        self.shards
            .iter()
            .any(|shard| shard.tags.read().values().any(|set| set.contains(id)))
    }

    /// Snapshot of every tag key currently indexed, across all shards.
    pub fn all_tags(&self) -> Vec<String> {
        let mut out = Vec::new();
        for shard in &self.shards {
            out.extend(shard.tags.read().keys().cloned());
        }
        out
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for ShardedTagIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_roundtrip() {
        let index = ShardedTagIndex::new();
        index.add_tag("status:active", "e1");
        index.add_tag("status:active", "e2");
        let mut ids = index.get("status:active");
        ids.sort();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn remove_tag_drops_entry_when_set_empties() {
        let index = ShardedTagIndex::new();
        index.add_tag("status:active", "e1");
        index.remove_tag("status:active", "e1");
        assert!(index.get("status:active").is_empty());
        assert!(!index.all_tags().contains(&"status:active".to_string()));
    }

    #[test]
    fn has_entity_scans_all_shards() {
        let index = ShardedTagIndex::with_shard_count(8);
        index.add_tag("type:user", "e1");
        assert!(index.has_entity("e1"));
        assert!(!index.has_entity("e2"));
    }

    #[test]
    fn disjoint_tags_may_land_in_different_shards() {
        let index = ShardedTagIndex::with_shard_count(16);
        for i in 0..50 {
            index.add_tag(&format!("tag:{i}"), "e1");
        }
        assert!(index.shard_count() > 1);
        assert_eq!(index.all_tags().len(), 50);
    }
}
