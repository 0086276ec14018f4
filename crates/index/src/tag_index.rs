//! Facade combining the sharded tag index and its variant cache into the
//! single tag-lookup surface the repository consumes: exact, intersection,
//! union and wildcard listing, with temporal-variant resolution folded in.

use crate::sharded_tag_index::{ShardedTagIndex, DEFAULT_SHARD_COUNT};
use crate::snapshot::TagIndexSnapshot;
use crate::variant_cache::VariantCache;
use entity_core::tag::Tag;
use std::collections::BTreeSet;

pub struct TagIndex {
    shards: ShardedTagIndex,
    variants: VariantCache,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    pub fn with_shard_count(count: usize) -> Self {
        TagIndex {
            shards: ShardedTagIndex::with_shard_count(count),
            variants: VariantCache::new(),
        }
    }

    /// Index one temporal tag under both its full key and its clean body,
    /// and record it in the variant cache.
    pub fn add_tag(&self, id: &str, tag: &Tag) {
        self.shards.add_tag(tag.as_str(), id);
        self.shards.add_tag(tag.body(), id);
        self.variants.record(tag.body(), tag.as_str(), id);
    }

    pub fn remove_tag(&self, id: &str, tag: &Tag) {
        self.shards.remove_tag(tag.as_str(), id);
        self.shards.remove_tag(tag.body(), id);
        self.variants.remove(tag.body(), tag.as_str(), id);
    }

    /// Drop every index association for `id`, e.g. on delete or before a
    /// full update re-index.
    pub fn remove_entity(&self, id: &str, tags: &[Tag]) {
        for tag in tags {
            self.remove_tag(id, tag);
        }
        self.variants.clear_entity(id);
    }

    pub fn has_entity(&self, id: &str) -> bool {
        self.shards.has_entity(id)
    }

    /// Direct shard lookup unioned with the variant-cache lookup,
    /// deduplicated. Accepts either a clean body or a full temporal key.
    pub fn list_by_tag(&self, tag: &str) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.variants.entities_for_body(tag).into_iter().collect();
        ids.extend(self.shards.get(tag));
        ids.into_iter().collect()
    }

    /// Intersection (`match_all`) or union of `list_by_tag` over several
    /// tag bodies.
    pub fn list_by_tags(&self, bodies: &[String], match_all: bool) -> Vec<String> {
        if bodies.is_empty() {
            return Vec::new();
        }
        let sets: Vec<BTreeSet<String>> = bodies
            .iter()
            .map(|b| self.list_by_tag(b).into_iter().collect())
            .collect();
        if match_all {
            let mut iter = sets.into_iter();
            let Some(first) = iter.next() else {
                return Vec::new();
            };
            iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect())
                .into_iter()
                .collect()
        } else {
            let mut union = BTreeSet::new();
            for s in sets {
                union.extend(s);
            }
            union.into_iter().collect()
        }
    }

    /// Prefix match against every known clean tag body. `pattern` is
    /// expected to end in `*`; anything after the trailing `*` is ignored,
    /// matching a single trailing-wildcard glob.
    pub fn list_by_wildcard(&self, pattern: &str) -> Vec<String> {
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        let mut ids = BTreeSet::new();
        for body in self.variants.bodies() {
            if body.starts_with(prefix) {
                ids.extend(self.variants.entities_for_body(&body));
            }
        }
        ids.into_iter().collect()
    }

    pub fn all_tags(&self) -> Vec<String> {
        self.shards.all_tags()
    }

    pub fn snapshot(&self) -> TagIndexSnapshot {
        TagIndexSnapshot::from_index(&self.shards)
    }

    /// Restore the shard-level mapping from a persisted snapshot. The
    /// variant cache is intentionally not part of the snapshot — it is
    /// rebuilt lazily as entities are re-touched, since the shard index
    /// alone (which stores clean bodies directly) already answers
    /// `list_by_tag` correctly.
    pub fn load_snapshot(&self, snapshot: &TagIndexSnapshot) {
        snapshot.apply(&self.shards);
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new()
    }
}
