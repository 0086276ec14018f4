//! Per-entity ordered timeline of `(timestamp, tag body)` pairs, answering
//! as-of, history, and recent-changes queries.

use entity_core::timestamp::Timestamp;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalEntry {
    pub timestamp: Timestamp,
    pub body: String,
}

#[derive(Default)]
pub struct TemporalIndex {
    timelines: RwLock<FxHashMap<String, Vec<TemporalEntry>>>,
}

impl TemporalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to `id`'s timeline, keeping it sorted ascending by
    /// timestamp. `Vec::sort_by_key` is a stable sort, so entries with
    /// equal timestamps retain insertion order, matching the "ties broken
    /// by insertion order" rule.
    pub fn add_entry(&self, id: &str, body: &str, ts: Timestamp) {
        let mut timelines = self.timelines.write();
        let timeline = timelines.entry(id.to_string()).or_default();
        timeline.push(TemporalEntry {
            timestamp: ts,
            body: body.to_string(),
        });
        timeline.sort_by_key(|e| e.timestamp);
    }

    /// Bulk-load a full timeline for `id`, e.g. while rebuilding from an
    /// entity's stored tags. Replaces any existing timeline for `id`.
    pub fn set_timeline(&self, id: &str, mut entries: Vec<TemporalEntry>) {
        entries.sort_by_key(|e| e.timestamp);
        self.timelines.write().insert(id.to_string(), entries);
    }

    /// The set of tag bodies whose latest occurrence at or before `at` is
    /// most recent — an entity's state as of a point in time.
    pub fn entity_as_of(&self, id: &str, at: Timestamp) -> Vec<String> {
        let timelines = self.timelines.read();
        let Some(timeline) = timelines.get(id) else {
            return Vec::new();
        };
        let mut latest: FxHashMap<&str, Timestamp> = FxHashMap::default();
        for entry in timeline.iter().filter(|e| e.timestamp <= at) {
            latest
                .entry(entry.body.as_str())
                .and_modify(|t| {
                    if entry.timestamp > *t {
                        *t = entry.timestamp;
                    }
                })
                .or_insert(entry.timestamp);
        }
        let mut bodies: Vec<String> = latest.into_keys().map(str::to_string).collect();
        bodies.sort();
        bodies
    }

    pub fn entity_history(&self, id: &str, from: Timestamp, to: Timestamp) -> Vec<TemporalEntry> {
        let timelines = self.timelines.read();
        timelines
            .get(id)
            .map(|timeline| {
                timeline
                    .iter()
                    .filter(|e| e.timestamp >= from && e.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entity ids with at least one timeline entry at or after `since`,
    /// sorted for determinism.
    pub fn recent_changes(&self, since: Timestamp) -> Vec<String> {
        let timelines = self.timelines.read();
        let mut ids: Vec<String> = timelines
            .iter()
            .filter(|(_, timeline)| timeline.iter().any(|e| e.timestamp >= since))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn remove_entity(&self, id: &str) {
        self.timelines.write().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_of_reflects_spec_s2() {
        let index = TemporalIndex::new();
        index.add_entry("u", "status:active", Timestamp::from_nanos(0));
        index.add_entry("u", "status:inactive", Timestamp::from_nanos(10));

        let at_t0 = index.entity_as_of("u", Timestamp::from_nanos(0));
        assert_eq!(at_t0, vec!["status:active".to_string()]);

        let mut at_t1 = index.entity_as_of("u", Timestamp::from_nanos(10));
        at_t1.sort();
        assert_eq!(
            at_t1,
            vec!["status:active".to_string(), "status:inactive".to_string()]
        );
    }

    #[test]
    fn as_of_keeps_latest_occurrence_of_repeated_body() {
        let index = TemporalIndex::new();
        index.add_entry("u", "value:temp", Timestamp::from_nanos(0));
        index.add_entry("u", "value:temp", Timestamp::from_nanos(5));
        let bodies = index.entity_as_of("u", Timestamp::from_nanos(5));
        assert_eq!(bodies, vec!["value:temp".to_string()]);
    }

    #[test]
    fn history_filters_by_range() {
        let index = TemporalIndex::new();
        index.add_entry("u", "a", Timestamp::from_nanos(1));
        index.add_entry("u", "b", Timestamp::from_nanos(5));
        index.add_entry("u", "c", Timestamp::from_nanos(10));
        let entries = index.entity_history("u", Timestamp::from_nanos(2), Timestamp::from_nanos(9));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "b");
    }

    #[test]
    fn recent_changes_filters_by_lower_bound() {
        let index = TemporalIndex::new();
        index.add_entry("u1", "a", Timestamp::from_nanos(1));
        index.add_entry("u2", "b", Timestamp::from_nanos(100));
        let changed = index.recent_changes(Timestamp::from_nanos(50));
        assert_eq!(changed, vec!["u2".to_string()]);
    }

    #[test]
    fn missing_entity_returns_empty_results() {
        let index = TemporalIndex::new();
        assert!(index.entity_as_of("missing", Timestamp::from_nanos(1)).is_empty());
        assert!(index
            .entity_history("missing", Timestamp::from_nanos(0), Timestamp::from_nanos(10))
            .is_empty());
    }
}
