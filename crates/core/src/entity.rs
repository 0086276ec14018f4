//! The `Entity` record and its temporal tag timeline.

use crate::entity_id::EntityId;
use crate::error::{Error, Result};
use crate::limits::{MAX_CONTENT_BYTES, MAX_TAG_COUNT};
use crate::tag::Tag;
use crate::timestamp::Timestamp;

/// An opaque record identified by [`EntityId`], carrying an ordered list of
/// temporal tags and a binary content blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub tags: Vec<Tag>,
    pub content: Option<Vec<u8>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Entity {
    /// Construct a new entity, stamping the current time on both timestamps.
    /// Tags are left as-is; the repository is responsible for temporal
    /// prefixing of bare tag bodies before this is called.
    pub fn new(id: EntityId, tags: Vec<Tag>, content: Option<Vec<u8>>) -> Self {
        let now = Timestamp::now();
        Entity {
            id,
            tags,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate size limits independent of storage.
    pub fn validate(&self) -> Result<()> {
        if self.tags.len() > MAX_TAG_COUNT {
            return Err(Error::validation(format!(
                "entity has {} tags, exceeding limit of {MAX_TAG_COUNT}",
                self.tags.len()
            )));
        }
        if let Some(content) = &self.content {
            if content.len() as u64 > MAX_CONTENT_BYTES {
                return Err(Error::validation(format!(
                    "content is {} bytes, exceeding limit of {MAX_CONTENT_BYTES}",
                    content.len()
                )));
            }
        }
        Ok(())
    }

    /// The temporal timeline: `(timestamp, body)` pairs sorted ascending by
    /// time, ties broken by original tag order.
    pub fn timeline(&self) -> Vec<(Timestamp, &str)> {
        let mut entries: Vec<(Timestamp, &str)> = self
            .tags
            .iter()
            .map(|t| (Timestamp::from_nanos(t.timestamp_nanos()), t.body()))
            .collect();
        entries.sort_by_key(|(ts, _)| *ts);
        entries
    }

    /// The set of tag bodies whose latest occurrence is at or before `at`:
    /// an entity's state as of a point in time. Deletions are not tracked
    /// here — any occurrence of a tag counts toward this state.
    pub fn state_as_of(&self, at: Timestamp) -> Vec<&str> {
        use std::collections::HashMap;
        let mut latest: HashMap<&str, Timestamp> = HashMap::new();
        for (ts, body) in self.timeline() {
            if ts <= at {
                latest
                    .entry(body)
                    .and_modify(|existing| {
                        if ts > *existing {
                            *existing = ts;
                        }
                    })
                    .or_insert(ts);
            }
        }
        let mut bodies: Vec<&str> = latest.into_keys().collect();
        bodies.sort_unstable();
        bodies
    }

    /// True if any tag body equals `body` exactly.
    pub fn has_tag_body(&self, body: &str) -> bool {
        self.tags.iter().any(|t| t.body() == body)
    }

    /// Whether this entity represents a relationship: a relationship is just
    /// an entity carrying `type:relationship`, not a distinct record kind.
    pub fn is_relationship(&self) -> bool {
        self.has_tag_body("type:relationship")
    }

    /// Whether this entity represents engine-internal metrics, used by the
    /// recursion guard to avoid emitting metrics about metrics.
    pub fn is_metric(&self) -> bool {
        self.has_tag_body("type:metric")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(nanos: u64, body: &str) -> Tag {
        Tag::wrap(body, nanos)
    }

    #[test]
    fn state_as_of_includes_only_entries_up_to_time() {
        let entity = Entity {
            id: EntityId::parse("e1").unwrap(),
            tags: vec![tag(10, "status:active"), tag(20, "status:inactive")],
            content: None,
            created_at: Timestamp::from_nanos(10),
            updated_at: Timestamp::from_nanos(20),
        };
        let at10 = entity.state_as_of(Timestamp::from_nanos(10));
        assert_eq!(at10, vec!["status:active"]);

        let at20 = entity.state_as_of(Timestamp::from_nanos(20));
        let mut at20_sorted = at20.clone();
        at20_sorted.sort();
        assert_eq!(at20_sorted, vec!["status:active", "status:inactive"]);
    }

    #[test]
    fn timeline_is_sorted_ascending() {
        let entity = Entity {
            id: EntityId::parse("e1").unwrap(),
            tags: vec![tag(30, "c"), tag(10, "a"), tag(20, "b")],
            content: None,
            created_at: Timestamp::from_nanos(10),
            updated_at: Timestamp::from_nanos(30),
        };
        let timeline = entity.timeline();
        let bodies: Vec<&str> = timeline.iter().map(|(_, b)| *b).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
    }

    #[test]
    fn validate_rejects_oversize_content() {
        let entity = Entity {
            id: EntityId::parse("e1").unwrap(),
            tags: vec![],
            content: Some(vec![0u8; (MAX_CONTENT_BYTES + 1) as usize]),
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        };
        assert!(entity.validate().is_err());
    }

    #[test]
    fn validate_rejects_too_many_tags() {
        let tags: Vec<Tag> = (0..MAX_TAG_COUNT + 1)
            .map(|i| tag(i as u64, "x"))
            .collect();
        let entity = Entity {
            id: EntityId::parse("e1").unwrap(),
            tags,
            content: None,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        };
        assert!(entity.validate().is_err());
    }

    #[test]
    fn relationship_and_metric_predicates() {
        let rel = Entity::new(
            EntityId::generate(),
            vec![tag(1, "type:relationship"), tag(1, "_source:a")],
            None,
        );
        assert!(rel.is_relationship());
        assert!(!rel.is_metric());

        let metric = Entity::new(EntityId::generate(), vec![tag(1, "type:metric")], None);
        assert!(metric.is_metric());
        assert!(!metric.is_relationship());
    }
}
