//! `namespace -> {entity ids}`, where a namespace is the prefix before the
//! first `:` in a tag body. Backs prefix queries like `type:*`.

use entity_core::tag::namespace_of;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default)]
pub struct NamespaceIndex {
    by_namespace: RwLock<FxHashMap<String, FxHashSet<String>>>,
}

impl NamespaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract `body`'s namespace and index `id` under it. A no-op for
    /// bodies without a `:`.
    pub fn add_tag(&self, id: &str, body: &str) {
        if let Some(ns) = namespace_of(body) {
            self.by_namespace
                .write()
                .entry(ns.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub fn get_by_namespace(&self, ns: &str) -> Vec<String> {
        self.by_namespace
            .read()
            .get(ns)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop `id`'s membership in `body`'s namespace specifically, e.g. after
    /// removing one tag. Leaves `id` indexed under any namespace still
    /// backed by one of its other tags — the caller decides whether to call
    /// this at all based on whatever tags remain.
    pub fn remove_tag(&self, id: &str, body: &str) {
        let Some(ns) = namespace_of(body) else { return };
        let mut map = self.by_namespace.write();
        if let Some(set) = map.get_mut(ns) {
            set.remove(id);
            if set.is_empty() {
                map.remove(ns);
            }
        }
    }

    pub fn remove_entity(&self, id: &str) {
        let mut map = self.by_namespace.write();
        map.retain(|_, set| {
            set.remove(id);
            !set.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tag_indexes_by_namespace_prefix() {
        let index = NamespaceIndex::new();
        index.add_tag("e1", "type:user");
        index.add_tag("e2", "type:doc");
        index.add_tag("e3", "content:type:image/png");
        let mut users = index.get_by_namespace("type");
        users.sort();
        assert_eq!(users, vec!["e1".to_string(), "e2".to_string()]);
        assert_eq!(index.get_by_namespace("content"), vec!["e3".to_string()]);
    }

    #[test]
    fn bare_body_without_colon_is_not_indexed() {
        let index = NamespaceIndex::new();
        index.add_tag("e1", "standalone");
        assert!(index.get_by_namespace("standalone").is_empty());
    }

    #[test]
    fn remove_entity_clears_membership() {
        let index = NamespaceIndex::new();
        index.add_tag("e1", "type:user");
        index.remove_entity("e1");
        assert!(index.get_by_namespace("type").is_empty());
    }

    #[test]
    fn remove_tag_only_drops_that_namespace() {
        let index = NamespaceIndex::new();
        index.add_tag("e1", "type:user");
        index.add_tag("e1", "status:active");
        index.remove_tag("e1", "type:user");
        assert!(index.get_by_namespace("type").is_empty());
        assert_eq!(index.get_by_namespace("status"), vec!["e1".to_string()]);
    }

    #[test]
    fn remove_tag_keeps_namespace_if_another_tag_shares_it() {
        let index = NamespaceIndex::new();
        index.add_tag("e1", "type:user");
        index.add_tag("e1", "type:admin");
        index.remove_tag("e1", "type:user");
        assert_eq!(index.get_by_namespace("type"), vec!["e1".to_string()]);
    }
}
