//! Pre-computed `clean_body -> {entities}` cache derived from temporal
//! tags, plus its inverse `temporal_key -> {clean_bodies}`.
//!
//! Populated on every `add_tag`; avoids an O(N) scan over every temporal
//! key to answer `list_by_tag(body)` — the lookup becomes two O(1) map
//! reads (direct shard hit plus this cache) instead of a linear scan.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default)]
pub struct VariantCache {
    by_body: RwLock<FxHashMap<String, FxHashSet<String>>>,
    bodies_by_temporal_key: RwLock<FxHashMap<String, FxHashSet<String>>>,
}

impl VariantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, body: &str, temporal_key: &str, id: &str) {
        self.by_body
            .write()
            .entry(body.to_string())
            .or_default()
            .insert(id.to_string());
        self.bodies_by_temporal_key
            .write()
            .entry(temporal_key.to_string())
            .or_default()
            .insert(body.to_string());
    }

    pub fn remove(&self, body: &str, temporal_key: &str, id: &str) {
        let mut by_body = self.by_body.write();
        if let Some(set) = by_body.get_mut(body) {
            set.remove(id);
            if set.is_empty() {
                by_body.remove(body);
            }
        }
        drop(by_body);
        self.bodies_by_temporal_key.write().remove(temporal_key);
    }

    /// Drop every association for `id`, across all bodies. Called on
    /// delete and before a full re-index on update.
    pub fn clear_entity(&self, id: &str) {
        let mut by_body = self.by_body.write();
        by_body.retain(|_, set| {
            set.remove(id);
            !set.is_empty()
        });
    }

    pub fn entities_for_body(&self, body: &str) -> Vec<String> {
        self.by_body
            .read()
            .get(body)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn bodies_for_temporal_key(&self, temporal_key: &str) -> Vec<String> {
        self.bodies_by_temporal_key
            .read()
            .get(temporal_key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every clean body currently known, for wildcard prefix scans.
    pub fn bodies(&self) -> Vec<String> {
        self.by_body.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup_by_body() {
        let cache = VariantCache::new();
        cache.record("status:active", "100|status:active", "e1");
        assert_eq!(cache.entities_for_body("status:active"), vec!["e1"]);
        assert_eq!(
            cache.bodies_for_temporal_key("100|status:active"),
            vec!["status:active"]
        );
    }

    #[test]
    fn clear_entity_removes_from_every_body() {
        let cache = VariantCache::new();
        cache.record("type:user", "1|type:user", "e1");
        cache.record("status:active", "2|status:active", "e1");
        cache.clear_entity("e1");
        assert!(cache.entities_for_body("type:user").is_empty());
        assert!(cache.entities_for_body("status:active").is_empty());
    }

    #[test]
    fn remove_single_association_keeps_others() {
        let cache = VariantCache::new();
        cache.record("status:active", "1|status:active", "e1");
        cache.record("status:active", "2|status:active", "e2");
        cache.remove("status:active", "1|status:active", "e1");
        assert_eq!(cache.entities_for_body("status:active"), vec!["e2"]);
    }

    #[test]
    fn bodies_lists_every_known_clean_tag() {
        let cache = VariantCache::new();
        cache.record("content:type:image/png", "1|content:type:image/png", "e1");
        cache.record("content:type:image/jpeg", "2|content:type:image/jpeg", "e2");
        let mut bodies = cache.bodies();
        bodies.sort();
        assert_eq!(bodies, vec!["content:type:image/jpeg", "content:type:image/png"]);
    }
}
