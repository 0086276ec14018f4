//! Bounded, best-effort in-memory entity cache.
//!
//! A cache miss always falls back to disk via the pooled reader, so this
//! is an accelerator, not a source of truth — except for entries marked
//! dirty, whose in-memory state is newer than what is on disk (the
//! `add_tag` fast path WAL-appends without an immediate data rewrite).
//! Dirty entries are pinned against eviction until a checkpoint persists
//! them and calls [`EntityCache::mark_clean`].

use entity_core::entity::Entity;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::{HashSet, VecDeque};

struct Inner {
    entries: FxHashMap<String, Entity>,
    order: VecDeque<String>,
    dirty: HashSet<String>,
}

pub struct EntityCache {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl EntityCache {
    pub fn new(capacity: usize) -> Self {
        EntityCache {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner {
                entries: FxHashMap::default(),
                order: VecDeque::new(),
                dirty: HashSet::new(),
            }),
        }
    }

    pub fn get(&self, id: &str) -> Option<Entity> {
        self.inner.read().entries.get(id).cloned()
    }

    pub fn put(&self, entity: Entity, dirty: bool) {
        let id = entity.id.as_str().to_string();
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&id) {
            inner.order.push_back(id.clone());
        }
        inner.entries.insert(id.clone(), entity);
        if dirty {
            inner.dirty.insert(id);
        }
        let capacity = self.capacity;
        Self::evict_if_needed(&mut inner, capacity);
    }

    fn evict_if_needed(inner: &mut Inner, capacity: usize) {
        while inner.entries.len() > capacity {
            let Some(candidate) = inner
                .order
                .iter()
                .find(|id| !inner.dirty.contains(id.as_str()))
                .cloned()
            else {
                break;
            };
            inner.order.retain(|id| id != &candidate);
            inner.entries.remove(&candidate);
        }
    }

    pub fn remove(&self, id: &str) {
        let mut inner = self.inner.write();
        inner.entries.remove(id);
        inner.order.retain(|x| x != id);
        inner.dirty.remove(id);
    }

    pub fn mark_clean(&self, id: &str) {
        self.inner.write().dirty.remove(id);
    }

    /// Ids whose cached state has not yet been persisted to the data
    /// section, for the checkpoint manager to flush.
    pub fn dirty_ids(&self) -> Vec<String> {
        self.inner.read().dirty.iter().cloned().collect()
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.inner.read().dirty.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_core::entity_id::EntityId;
    use entity_core::tag::Tag;

    fn entity(id: &str) -> Entity {
        Entity::new(EntityId::parse(id).unwrap(), vec![Tag::wrap("type:x", 1)], None)
    }

    #[test]
    fn put_and_get_roundtrip() {
        let cache = EntityCache::new(10);
        cache.put(entity("e1"), false);
        assert!(cache.get("e1").is_some());
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn dirty_entries_are_never_evicted() {
        let cache = EntityCache::new(1);
        cache.put(entity("e1"), true);
        cache.put(entity("e2"), false);
        // e1 is dirty and must survive even though capacity is 1.
        assert!(cache.get("e1").is_some());
    }

    #[test]
    fn clean_entries_evict_in_insertion_order() {
        let cache = EntityCache::new(1);
        cache.put(entity("e1"), false);
        cache.put(entity("e2"), false);
        assert!(cache.get("e1").is_none());
        assert!(cache.get("e2").is_some());
    }

    #[test]
    fn mark_clean_allows_later_eviction() {
        let cache = EntityCache::new(1);
        cache.put(entity("e1"), true);
        cache.mark_clean("e1");
        cache.put(entity("e2"), false);
        assert!(cache.get("e1").is_none());
    }

    #[test]
    fn dirty_ids_lists_only_unpersisted_entries() {
        let cache = EntityCache::new(10);
        cache.put(entity("e1"), true);
        cache.put(entity("e2"), false);
        assert_eq!(cache.dirty_ids(), vec!["e1".to_string()]);
    }
}
