//! Health checking and index repair (spec §4.10).
//!
//! Health is defined by the spec's literal invariant: the entity map and
//! the tag index must agree on which ids exist, in both directions.
//! Repair rebuilds the tag, temporal and namespace indexes from scratch
//! off the entity map, which is always the source of truth.

use entity_core::entity::Entity;
use entity_core::timestamp::Timestamp;
use entity_index::{NamespaceIndex, TagIndex, TemporalEntry, TemporalIndex};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub entity_count: usize,
    pub indexed_entity_count: usize,
    pub missing_from_index: Vec<String>,
    pub extra_in_index: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_from_index.is_empty() && self.extra_in_index.is_empty()
    }
}

/// Compare the entity map's id set against every id reachable through the
/// tag index's own bookkeeping.
pub fn health_check(entity_ids: &[String], tag_index: &TagIndex) -> HealthReport {
    let entity_set: BTreeSet<String> = entity_ids.iter().cloned().collect();

    let mut indexed_set = BTreeSet::new();
    for tag in tag_index.all_tags() {
        indexed_set.extend(tag_index.list_by_tag(&tag));
    }

    let missing_from_index: Vec<String> = entity_set.difference(&indexed_set).cloned().collect();
    let extra_in_index: Vec<String> = indexed_set.difference(&entity_set).cloned().collect();

    HealthReport {
        entity_count: entity_set.len(),
        indexed_entity_count: indexed_set.len(),
        missing_from_index,
        extra_in_index,
    }
}

/// Rebuild the tag, temporal and namespace indexes from the entity map,
/// which is always trusted as the source of truth. Returns fresh index
/// instances for the repository to swap in.
pub fn repair_indexes(entities: &[Entity]) -> (TagIndex, TemporalIndex, NamespaceIndex) {
    let tag_index = TagIndex::new();
    let temporal_index = TemporalIndex::new();
    let namespace_index = NamespaceIndex::new();

    for entity in entities {
        let id = entity.id.as_str();
        let mut timeline = Vec::with_capacity(entity.tags.len());
        for tag in &entity.tags {
            tag_index.add_tag(id, tag);
            namespace_index.add_tag(id, tag.body());
            timeline.push(TemporalEntry {
                timestamp: Timestamp::from_nanos(tag.timestamp_nanos()),
                body: tag.body().to_string(),
            });
        }
        temporal_index.set_timeline(id, timeline);
    }

    (tag_index, temporal_index, namespace_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_core::entity_id::EntityId;
    use entity_core::tag::Tag;

    fn entity(id: &str, tags: Vec<&str>) -> Entity {
        Entity::new(
            EntityId::parse(id).unwrap(),
            tags.into_iter().enumerate().map(|(i, t)| Tag::wrap(t, i as u64)).collect(),
            None,
        )
    }

    #[test]
    fn health_check_detects_entity_missing_from_index() {
        let tag_index = TagIndex::new();
        tag_index.add_tag("e1", &Tag::wrap("type:user", 1));
        let report = health_check(&["e1".to_string(), "e2".to_string()], &tag_index);
        assert!(!report.is_healthy());
        assert_eq!(report.missing_from_index, vec!["e2".to_string()]);
    }

    #[test]
    fn health_check_detects_entity_extra_in_index() {
        let tag_index = TagIndex::new();
        tag_index.add_tag("e1", &Tag::wrap("type:user", 1));
        tag_index.add_tag("ghost", &Tag::wrap("type:user", 1));
        let report = health_check(&["e1".to_string()], &tag_index);
        assert!(!report.is_healthy());
        assert_eq!(report.extra_in_index, vec!["ghost".to_string()]);
    }

    #[test]
    fn healthy_when_sets_match_exactly() {
        let tag_index = TagIndex::new();
        tag_index.add_tag("e1", &Tag::wrap("type:user", 1));
        let report = health_check(&["e1".to_string()], &tag_index);
        assert!(report.is_healthy());
    }

    #[test]
    fn repair_indexes_rebuilds_tag_and_namespace_lookups() {
        let entities = vec![entity("e1", vec!["type:user", "status:active"])];
        let (tag_index, temporal_index, namespace_index) = repair_indexes(&entities);
        assert_eq!(tag_index.list_by_tag("type:user"), vec!["e1".to_string()]);
        assert_eq!(namespace_index.get_by_namespace("type"), vec!["e1".to_string()]);
        assert_eq!(
            temporal_index.entity_as_of("e1", Timestamp::from_nanos(1)),
            vec!["status:active".to_string(), "type:user".to_string()]
        );
    }
}
