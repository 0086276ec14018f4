//! The entity repository: the single orchestrator tying the EUFF file, its
//! embedded WAL, and the in-memory tag/temporal/namespace/content indexes
//! together into the CRUD + list + temporal surface described by spec §4.8.
//!
//! Lock ordering follows spec §5: a per-entity lock from [`EntityLockManager`]
//! guards an id's logical state, [`WriterLock`] then serializes the actual
//! bytes hitting the file (append, footer rewrite, or full rewrite), and the
//! tag/temporal/namespace indexes carry their own independent internal
//! locking so lookups on unrelated tags never contend with an in-flight
//! write.

use crate::batch::{BatchOp, BatchWriter};
use crate::cache::EntityCache;
use crate::checkpoint::CheckpointManager;
use crate::config::RepositoryConfig;
use crate::content_index::ContentIndex;
use crate::file::EuffFile;
use crate::metrics::{self, Labels, MetricSink, NoopMetricSink};
use crate::operation::{NoopOperationSink, OperationGuard, OperationKind, OperationSink};
use crate::reader::ReaderPool;
use crate::recovery::{self, HealthReport};
use crate::rewrite;
use crate::writer::Writer;

use entity_core::entity::Entity;
use entity_core::entity_id::EntityId;
use entity_core::error::{Error, Result};
use entity_core::tag::{namespace_of, Tag};
use entity_core::timestamp::Timestamp;
use entity_format::deletion_entry::DeletionEntry;
use entity_format::index_entry::IndexEntry;
use entity_index::{NamespaceIndex, TagIndex, TagIndexSnapshot, TemporalEntry, TemporalIndex};
use entity_wal::{EntityPayload, OpType, Wal};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// One entry in an entity's tag timeline, returned by [`EntityRepository::entity_history`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub timestamp: Timestamp,
    pub tag_body: String,
}

struct Store {
    euff: EuffFile,
    wal: Wal,
}

/// The embedded entity database. One instance owns one EUFF file and every
/// in-memory structure layered over it.
pub struct EntityRepository {
    config: RepositoryConfig,
    snapshot_path: PathBuf,
    store: Mutex<Store>,
    writer_lock: entity_index::lock_manager::WriterLock,
    entity_locks: entity_index::lock_manager::EntityLockManager,
    live_ids: RwLock<FxHashSet<String>>,
    index_map: RwLock<FxHashMap<String, IndexEntry>>,
    deletions: RwLock<FxHashMap<String, DeletionEntry>>,
    cache: EntityCache,
    tag_index: TagIndex,
    temporal_index: TemporalIndex,
    namespace_index: NamespaceIndex,
    content_index: ContentIndex,
    reader_pool: ReaderPool,
    checkpoint: CheckpointManager,
    batch: Option<BatchWriter>,
    metric_sink: Box<dyn MetricSink>,
    operation_sink: Box<dyn OperationSink>,
    emergency: AtomicBool,
}

impl EntityRepository {
    /// Open (or create) a repository rooted at `dir`, using no-op metric and
    /// operation sinks.
    pub fn open(dir: impl AsRef<Path>, config: RepositoryConfig) -> Result<Self> {
        Self::open_with_sinks(dir, config, Box::new(NoopMetricSink), Box::new(NoopOperationSink))
    }

    /// Open (or create) a repository, wiring it up to caller-supplied metric
    /// and operation-tracking sinks.
    pub fn open_with_sinks(
        dir: impl AsRef<Path>,
        config: RepositoryConfig,
        metric_sink: Box<dyn MetricSink>,
        operation_sink: Box<dyn OperationSink>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(&config.database_filename);

        let mut euff = EuffFile::open_or_create(&db_path)?;
        let file_size = euff.file_len()?;

        let wal_file = euff.reopen_for_wal()?;
        let mut wal = Wal::open(wal_file, euff.header.wal_offset, euff.header.wal_size, euff.header.wal_sequence);
        wal.validate_bounds(file_size)?;

        let entity_index = euff.read_entity_index()?;
        let deletion_index = euff.read_deletion_index()?;

        let reader_pool = ReaderPool::new();
        let mut entities: FxHashMap<String, Entity> = FxHashMap::default();
        let mut index_map: FxHashMap<String, IndexEntry> = FxHashMap::default();
        for entry in entity_index {
            if !entry.is_plausible(file_size) {
                tracing::warn!(id = %entry.entity_id, "dropping implausible entity index entry found at startup");
                continue;
            }
            let id = EntityId::parse(entry.entity_id.clone())?;
            let entity = reader_pool.with_reader(&db_path, &euff.header, |reader| {
                reader.read_entity(&id, entry.offset, entry.size)
            })?;
            index_map.insert(entry.entity_id.clone(), entry.clone());
            entities.insert(entry.entity_id.clone(), entity);
        }

        let replayed = wal.replay()?;
        let mut touched_ids: Vec<String> = Vec::new();
        for wal_entry in &replayed {
            match wal_entry.op_type {
                OpType::Checkpoint => {}
                OpType::Create | OpType::Update => {
                    if let Some(payload) = &wal_entry.payload {
                        let tags: Result<Vec<Tag>> = payload.tags.iter().cloned().map(Tag::parse).collect();
                        let tags = tags?;
                        let id = EntityId::parse(wal_entry.entity_id.clone())?;
                        let created_at = entities
                            .get(&wal_entry.entity_id)
                            .map(|e| e.created_at)
                            .unwrap_or_else(|| Timestamp::from_nanos(wal_entry.timestamp_ns));
                        let entity = Entity {
                            id,
                            tags,
                            content: payload.content.clone(),
                            created_at,
                            updated_at: Timestamp::from_nanos(wal_entry.timestamp_ns),
                        };
                        entities.insert(wal_entry.entity_id.clone(), entity);
                        touched_ids.push(wal_entry.entity_id.clone());
                    }
                }
                OpType::Delete => {
                    entities.remove(&wal_entry.entity_id);
                    index_map.remove(&wal_entry.entity_id);
                    touched_ids.push(wal_entry.entity_id.clone());
                }
            }
        }
        touched_ids.sort();
        touched_ids.dedup();

        let mut deletions: FxHashMap<String, DeletionEntry> =
            deletion_index.into_iter().map(|d| (d.entity_id.clone(), d)).collect();
        for wal_entry in &replayed {
            if matches!(wal_entry.op_type, OpType::Delete) && !deletions.contains_key(&wal_entry.entity_id) {
                deletions.insert(
                    wal_entry.entity_id.clone(),
                    DeletionEntry::soft_delete(wal_entry.entity_id.clone(), wal_entry.timestamp_ns, [0u8; 32]),
                );
            }
        }

        let entity_list: Vec<Entity> = entities.values().cloned().collect();
        let snapshot_path = snapshot_path_for(&db_path);
        let snapshot = if replayed.is_empty() {
            try_load_snapshot(&db_path, &snapshot_path)
        } else {
            None
        };

        let (tag_index, temporal_index, namespace_index) = match snapshot {
            Some(snapshot) => {
                let tag_index = TagIndex::with_shard_count(config.tag_shard_count);
                tag_index.load_snapshot(&snapshot);
                let (_, temporal_index, namespace_index) = recovery::repair_indexes(&entity_list);
                (tag_index, temporal_index, namespace_index)
            }
            None => recovery::repair_indexes(&entity_list),
        };

        let all_ids: Vec<String> = entity_list.iter().map(|e| e.id.as_str().to_string()).collect();
        let health = recovery::health_check(&all_ids, &tag_index);
        let (tag_index, temporal_index, namespace_index) = if health.is_healthy() {
            (tag_index, temporal_index, namespace_index)
        } else {
            tracing::warn!(
                missing = health.missing_from_index.len(),
                extra = health.extra_in_index.len(),
                "tag index disagreed with the entity map at startup, rebuilding from the entity map"
            );
            recovery::repair_indexes(&entity_list)
        };

        let content_index = ContentIndex::with_capacity(config.content_index_capacity);
        for entity in &entity_list {
            if let Some(content) = &entity.content {
                content_index.index(entity.id.as_str(), &String::from_utf8_lossy(content));
            }
        }

        let cache = EntityCache::new(config.entity_cache_size);
        for id in &touched_ids {
            if let Some(entity) = entities.get(id) {
                cache.put(entity.clone(), true);
            }
        }

        let checkpoint = CheckpointManager::new_with_sequence(config.checkpoint, euff.header.checkpoint_sequence);
        let batch = config
            .use_batch_writes
            .then(|| BatchWriter::new(config.batch_size, config.flush_interval));

        tracing::info!(
            entities = entity_list.len(),
            wal_entries_replayed = replayed.len(),
            "recovery complete"
        );

        Ok(EntityRepository {
            config,
            snapshot_path,
            store: Mutex::new(Store { euff, wal }),
            writer_lock: entity_index::lock_manager::WriterLock::new(),
            entity_locks: entity_index::lock_manager::EntityLockManager::new(),
            live_ids: RwLock::new(all_ids.into_iter().collect()),
            index_map: RwLock::new(index_map),
            deletions: RwLock::new(deletions),
            cache,
            tag_index,
            temporal_index,
            namespace_index,
            content_index,
            reader_pool,
            checkpoint,
            batch,
            metric_sink,
            operation_sink,
            emergency: AtomicBool::new(false),
        })
    }

    // ---- CRUD -------------------------------------------------------

    /// Create a new entity. `id` is generated when absent or empty.
    pub fn create(&self, id: Option<String>, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        self.check_emergency()?;
        let mut guard = OperationGuard::start(
            self.operation_sink.as_ref(),
            OperationKind::Create,
            id.as_deref().unwrap_or("<generated>"),
        );
        let result = self.create_inner(id, tags, content);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn create_inner(&self, id: Option<String>, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        let entity_id = match id {
            Some(raw) if !raw.is_empty() => EntityId::parse(raw)?,
            _ => EntityId::generate(),
        };
        if self.live_ids.read().contains(entity_id.as_str()) {
            return Err(Error::conflict(format!("entity {} already exists", entity_id.as_str())));
        }
        let now = Timestamp::now();
        let mut stamped = stamp_tags(tags, now)?;
        ensure_checksum_tag(&mut stamped, content.as_deref(), now);
        let entity = Entity { id: entity_id, tags: stamped, content, created_at: now, updated_at: now };
        entity.validate()?;

        {
            let _write_guard = self.writer_lock.lock();
            let mut store = self.store.lock();
            self.append_wal(&mut store, OpType::Create, now, entity.id.as_str(), Some(to_payload(&entity)), true)?;

            let entry = {
                let mut writer = Writer::new(&mut store.euff, self.config.compression_threshold_bytes);
                writer.append_entity(&entity)?
            };
            let mut index_map = self.index_map.write();
            index_map.insert(entity.id.as_str().to_string(), entry);
            let entity_values: Vec<IndexEntry> = index_map.values().cloned().collect();
            drop(index_map);
            let deletion_values: Vec<DeletionEntry> = self.deletions.read().values().cloned().collect();
            store.euff.write_footer(&entity_values, &deletion_values)?;
            store.euff.sync()?;
        }

        self.live_ids.write().insert(entity.id.as_str().to_string());
        self.reindex_entity(&entity);
        self.cache.put(entity.clone(), false);
        self.reader_pool.drain();
        self.checkpoint.record_op();
        self.maybe_checkpoint();
        if metrics::should_emit_for(&entity) {
            metrics::emit(self.metric_sink.as_ref(), "entity.created", 1.0, "count", "entities created", &Labels::new());
        }
        Ok(entity)
    }

    /// Fetch an entity by id. Falls back to disk, and — if the in-memory
    /// bookkeeping has drifted from the file — detects and repairs that
    /// drift for this one id before giving up.
    pub fn get(&self, id: &str) -> Result<Entity> {
        let mut guard = OperationGuard::start(self.operation_sink.as_ref(), OperationKind::Get, id);
        let result = self.get_inner(id);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn get_inner(&self, id: &str) -> Result<Entity> {
        if let Some(entity) = self.cache.get(id) {
            return Ok(entity);
        }
        if self.live_ids.read().contains(id) {
            let entry = self.index_map.read().get(id).cloned();
            if let Some(entry) = entry {
                return self.load_and_cache(id, &entry);
            }
        }
        if let Some(entity) = self.detect_and_fix_index_corruption(id)? {
            return Ok(entity);
        }
        Err(Error::not_found(id))
    }

    fn load_and_cache(&self, id: &str, entry: &IndexEntry) -> Result<Entity> {
        let entity_id = EntityId::parse(id.to_string())?;
        let (path, header) = {
            let store = self.store.lock();
            (store.euff.path().to_path_buf(), store.euff.header)
        };
        let entity = self
            .reader_pool
            .with_reader(&path, &header, |reader| reader.read_entity(&entity_id, entry.offset, entry.size))?;
        if let Err(msg) = validate_checksum(&entity) {
            tracing::warn!(id, error = %msg, "entity failed checksum validation on read");
        }
        self.cache.put(entity.clone(), false);
        Ok(entity)
    }

    /// `detectAndFixIndexCorruption` (spec §4.10): an id missing from the
    /// live-id set and the entity index but still present in the file is
    /// re-adopted rather than treated as not-found.
    fn detect_and_fix_index_corruption(&self, id: &str) -> Result<Option<Entity>> {
        let (file_size, entry) = {
            let mut store = self.store.lock();
            let file_size = store.euff.file_len()?;
            let entry = store.euff.read_entity_index()?.into_iter().find(|e| e.entity_id == id);
            (file_size, entry)
        };
        let Some(entry) = entry else { return Ok(None) };
        if !entry.is_plausible(file_size) {
            return Ok(None);
        }
        tracing::warn!(id, "entity missing from in-memory bookkeeping but present on disk, repairing");
        let entity = self.load_and_cache(id, &entry)?;
        self.live_ids.write().insert(id.to_string());
        self.index_map.write().insert(id.to_string(), entry);
        self.reindex_entity(&entity);
        Ok(Some(entity))
    }

    /// Replace an entity's tags and content in full, preserving its id and
    /// creation time. Implemented as a full-file rewrite (spec §9): simpler
    /// to reason about than append-plus-tombstone, and the data section is
    /// small enough in practice that the rewrite cost is acceptable.
    pub fn update(&self, id: &str, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        self.check_emergency()?;
        let mut guard = OperationGuard::start(self.operation_sink.as_ref(), OperationKind::Update, id);
        let result = self.update_inner(id, tags, content);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn update_inner(&self, id: &str, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        let entity_id = EntityId::parse(id.to_string())?;
        let lock = self.entity_locks.lock_for(id);
        let _entity_guard = lock.write();

        if !self.live_ids.read().contains(id) {
            return Err(Error::not_found(id));
        }
        let current = self.get_inner(id)?;
        let now = Timestamp::now();
        let mut stamped = stamp_tags(tags, now)?;
        ensure_checksum_tag(&mut stamped, content.as_deref(), now);
        let updated = Entity { id: entity_id, tags: stamped, content, created_at: current.created_at, updated_at: now };
        updated.validate()?;

        let _write_guard = self.writer_lock.lock();
        let mut store = self.store.lock();
        self.append_wal(&mut store, OpType::Update, now, id, Some(to_payload(&updated)), true)?;
        let preserved_sequence = store.wal.next_sequence();

        let mut all_entities = self.snapshot_all_entities()?;
        match all_entities.iter().position(|e| e.id.as_str() == id) {
            Some(pos) => all_entities[pos] = updated.clone(),
            None => all_entities.push(updated.clone()),
        }
        let deletion_values: Vec<DeletionEntry> = self.deletions.read().values().cloned().collect();

        let final_path = store.euff.path().to_path_buf();
        let tmp_path = final_path.with_extension("edb.rewrite");
        rewrite::rewrite_file(&tmp_path, &all_entities, &deletion_values, self.config.compression_threshold_bytes)?;
        rewrite::swap_into_place(&tmp_path, &final_path, now.as_nanos())?;
        let new_index_entries = self.reopen_after_rewrite(&mut store, &final_path, preserved_sequence)?;
        drop(store);
        drop(_write_guard);

        let mut index_map = self.index_map.write();
        index_map.clear();
        for entry in new_index_entries {
            index_map.insert(entry.entity_id.clone(), entry);
        }
        drop(index_map);

        self.checkpoint.mark_checkpointed();
        for dirty_id in self.cache.dirty_ids() {
            self.cache.mark_clean(&dirty_id);
        }
        self.deindex_entity(&current);
        self.reindex_entity(&updated);
        self.cache.put(updated.clone(), false);
        self.reader_pool.drain();
        self.checkpoint.record_op();
        self.persist_tag_snapshot();
        Ok(updated)
    }

    /// Delete an entity. Like `update`, implemented as a full-file rewrite
    /// excluding the deleted id, recording a soft-delete entry in the
    /// deletion index.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.check_emergency()?;
        let mut guard = OperationGuard::start(self.operation_sink.as_ref(), OperationKind::Delete, id);
        let result = self.delete_inner(id);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn delete_inner(&self, id: &str) -> Result<()> {
        let lock = self.entity_locks.lock_for(id);
        let _entity_guard = lock.write();

        if !self.live_ids.read().contains(id) {
            return Err(Error::not_found(id));
        }
        let current = self.get_inner(id)?;
        let now = Timestamp::now();

        let _write_guard = self.writer_lock.lock();
        let mut store = self.store.lock();
        self.append_wal(&mut store, OpType::Delete, now, id, None, true)?;
        let preserved_sequence = store.wal.next_sequence();

        let remaining: Vec<Entity> =
            self.snapshot_all_entities()?.into_iter().filter(|e| e.id.as_str() != id).collect();
        let mut deletions = self.deletions.read().clone();
        deletions.insert(id.to_string(), DeletionEntry::soft_delete(id.to_string(), now.as_nanos(), checksum_bytes(&current)));
        let deletion_values: Vec<DeletionEntry> = deletions.values().cloned().collect();

        let final_path = store.euff.path().to_path_buf();
        let tmp_path = final_path.with_extension("edb.rewrite");
        rewrite::rewrite_file(&tmp_path, &remaining, &deletion_values, self.config.compression_threshold_bytes)?;
        rewrite::swap_into_place(&tmp_path, &final_path, now.as_nanos())?;
        let new_index_entries = self.reopen_after_rewrite(&mut store, &final_path, preserved_sequence)?;
        drop(store);
        drop(_write_guard);

        let mut index_map = self.index_map.write();
        index_map.clear();
        for entry in new_index_entries {
            index_map.insert(entry.entity_id.clone(), entry);
        }
        drop(index_map);
        *self.deletions.write() = deletions;

        self.checkpoint.mark_checkpointed();
        for dirty_id in self.cache.dirty_ids() {
            self.cache.mark_clean(&dirty_id);
        }
        self.live_ids.write().remove(id);
        self.deindex_entity(&current);
        self.cache.remove(id);
        self.reader_pool.drain();
        self.checkpoint.record_op();
        self.persist_tag_snapshot();
        Ok(())
    }

    /// Reopen the file just swapped into place by a full rewrite, restoring
    /// the WAL sequence counter (the rewrite bakes every live entity's
    /// current state directly into the data section, so the new file needs
    /// no WAL backlog, but the monotonic sequence must carry over) and
    /// returning its fresh entity index.
    fn reopen_after_rewrite(&self, store: &mut Store, final_path: &Path, preserved_sequence: u64) -> Result<Vec<IndexEntry>> {
        let mut reopened = EuffFile::open_or_create(final_path)?;
        reopened.header.wal_sequence = preserved_sequence;
        reopened.header.checkpoint_sequence = self.checkpoint.sequence();
        reopened.write_header()?;
        reopened.sync()?;
        let wal_file = reopened.reopen_for_wal()?;
        let new_wal = Wal::open(wal_file, reopened.header.wal_offset, reopened.header.wal_size, reopened.header.wal_sequence);
        let entries = reopened.read_entity_index()?;
        *store = Store { euff: reopened, wal: new_wal };
        Ok(entries)
    }

    /// Append one temporal tag without rewriting the entity's data block:
    /// WAL-append only, deferring the physical re-append to the next
    /// checkpoint (spec §4.8's fast path).
    pub fn add_tag(&self, id: &str, tag_body: &str) -> Result<()> {
        self.check_emergency()?;
        let mut guard = OperationGuard::start(self.operation_sink.as_ref(), OperationKind::AddTag, id);
        let result = self.add_tag_inner(id, tag_body);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn add_tag_inner(&self, id: &str, tag_body: &str) -> Result<()> {
        if tag_body.is_empty() {
            return Err(Error::validation("tag body must not be empty"));
        }
        let lock = self.entity_locks.lock_for(id);
        let _entity_guard = lock.write();

        if !self.live_ids.read().contains(id) {
            return Err(Error::not_found(id));
        }
        let current = self.get_inner(id)?;
        let is_value_namespace = namespace_of(tag_body) == Some("value");
        if !is_value_namespace && current.has_tag_body(tag_body) {
            return Err(Error::conflict(format!("tag {tag_body} already present on {id}")));
        }
        if current.tags.len() + 1 > entity_core::limits::MAX_TAG_COUNT {
            return Err(Error::validation("tag count would exceed the per-entity limit"));
        }
        let now = Timestamp::now();
        let new_tag = Tag::wrap(tag_body, now.as_nanos());
        let mut updated = current;
        updated.tags.push(new_tag.clone());
        updated.updated_at = now;

        let durable = self.batch.is_none();
        {
            let _write_guard = self.writer_lock.lock();
            let mut store = self.store.lock();
            self.append_wal(&mut store, OpType::Update, now, id, Some(to_payload(&updated)), durable)?;
        }
        if !durable {
            if let Some(batch) = &self.batch {
                batch.push(BatchOp::AddTag { id: id.to_string(), tag: tag_body.to_string() });
            }
        }

        self.tag_index.add_tag(id, &new_tag);
        self.namespace_index.add_tag(id, new_tag.body());
        self.temporal_index.add_entry(id, new_tag.body(), now);
        self.cache.put(updated, true);
        self.checkpoint.record_op();
        self.flush_or_checkpoint()?;
        Ok(())
    }

    /// Remove every occurrence of a tag body from an entity. Like
    /// `add_tag`, WAL-append only — the data section catches up at the next
    /// checkpoint.
    pub fn remove_tag(&self, id: &str, tag_body: &str) -> Result<()> {
        self.check_emergency()?;
        let mut guard = OperationGuard::start(self.operation_sink.as_ref(), OperationKind::RemoveTag, id);
        let result = self.remove_tag_inner(id, tag_body);
        if let Err(e) = &result {
            guard.fail(e.to_string());
        }
        result
    }

    fn remove_tag_inner(&self, id: &str, tag_body: &str) -> Result<()> {
        let lock = self.entity_locks.lock_for(id);
        let _entity_guard = lock.write();

        if !self.live_ids.read().contains(id) {
            return Err(Error::not_found(id));
        }
        let current = self.get_inner(id)?;
        let removed_tags: Vec<Tag> = current.tags.iter().filter(|t| t.body() == tag_body).cloned().collect();
        if removed_tags.is_empty() {
            return Err(Error::not_found(format!("tag {tag_body} not present on {id}")));
        }
        let now = Timestamp::now();
        let mut updated = current;
        updated.tags.retain(|t| t.body() != tag_body);
        updated.updated_at = now;

        let durable = self.batch.is_none();
        {
            let _write_guard = self.writer_lock.lock();
            let mut store = self.store.lock();
            self.append_wal(&mut store, OpType::Update, now, id, Some(to_payload(&updated)), durable)?;
        }
        if !durable {
            if let Some(batch) = &self.batch {
                batch.push(BatchOp::RemoveTag { id: id.to_string(), tag: tag_body.to_string() });
            }
        }

        for tag in &removed_tags {
            self.tag_index.remove_tag(id, tag);
        }
        let namespace_still_present = updated.tags.iter().any(|t| t.namespace() == namespace_of(tag_body));
        if !namespace_still_present {
            self.namespace_index.remove_tag(id, tag_body);
        }
        let timeline: Vec<TemporalEntry> = updated
            .tags
            .iter()
            .map(|t| TemporalEntry { timestamp: Timestamp::from_nanos(t.timestamp_nanos()), body: t.body().to_string() })
            .collect();
        self.temporal_index.set_timeline(id, timeline);
        self.cache.put(updated, true);
        self.checkpoint.record_op();
        self.flush_or_checkpoint()?;
        Ok(())
    }

    fn flush_or_checkpoint(&self) -> Result<()> {
        if let Some(batch) = &self.batch {
            if batch.should_flush() {
                self.flush()?;
            }
        } else {
            self.maybe_checkpoint();
        }
        Ok(())
    }

    // ---- Listing and search ------------------------------------------

    pub fn list_by_tag(&self, tag: &str) -> Result<Vec<Entity>> {
        self.hydrate(self.tag_index.list_by_tag(tag))
    }

    pub fn list_by_tags(&self, tags: &[String], match_all: bool) -> Result<Vec<Entity>> {
        self.hydrate(self.tag_index.list_by_tags(tags, match_all))
    }

    pub fn list_by_wildcard(&self, pattern: &str) -> Result<Vec<Entity>> {
        self.hydrate(self.tag_index.list_by_wildcard(pattern))
    }

    pub fn list_by_namespace(&self, namespace: &str) -> Result<Vec<Entity>> {
        self.hydrate(self.namespace_index.get_by_namespace(namespace))
    }

    pub fn search_content(&self, substring: &str) -> Result<Vec<Entity>> {
        self.hydrate(self.content_index.search(substring))
    }

    /// Resolve ids to entities, logging and dropping (rather than failing)
    /// any id whose hydrate fails — list results fail open.
    fn hydrate(&self, ids: Vec<String>) -> Result<Vec<Entity>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_inner(&id) {
                Ok(entity) => out.push(entity),
                Err(e) => tracing::warn!(id, error = %e, "dropping id from list result: hydrate failed"),
            }
        }
        Ok(out)
    }

    // ---- Temporal queries ---------------------------------------------

    /// The entity's state as of `at`: its current content, layered with
    /// only the tags whose timeline places them at or before that time.
    pub fn entity_as_of(&self, id: &str, at: Timestamp) -> Result<Entity> {
        let current = self.get_inner(id)?;
        let bodies: FxHashSet<String> = self.temporal_index.entity_as_of(id, at).into_iter().collect();
        let tags: Vec<Tag> = current
            .tags
            .iter()
            .filter(|t| t.timestamp_nanos() <= at.as_nanos() && bodies.contains(t.body()))
            .cloned()
            .collect();
        Ok(Entity { id: current.id, tags, content: current.content, created_at: current.created_at, updated_at: current.updated_at })
    }

    /// An entity's tag timeline, oldest first, truncated to `limit` entries.
    pub fn entity_history(&self, id: &str, limit: usize) -> Result<Vec<Change>> {
        if !self.live_ids.read().contains(id) {
            return Err(Error::not_found(id));
        }
        let entries = self.temporal_index.entity_history(id, Timestamp::from_nanos(0), Timestamp::from_nanos(u64::MAX));
        Ok(entries.into_iter().take(limit).map(|e| Change { timestamp: e.timestamp, tag_body: e.body }).collect())
    }

    // ---- Checkpoint, batching, integrity, shutdown ---------------------

    /// Force a checkpoint now, regardless of the configured thresholds.
    pub fn checkpoint(&self) -> Result<()> {
        self.checkpoint_inner()
    }

    fn maybe_checkpoint(&self) {
        let wal_size = { self.store.lock().wal.size() };
        if self.checkpoint.should_checkpoint(wal_size) {
            if let Err(e) = self.checkpoint_inner() {
                tracing::warn!(error = %e, "automatic checkpoint failed, WAL left intact for the next attempt");
            }
        }
    }

    /// Spec §4.9's five steps: barrier WAL entry, persist every dirty
    /// cached entity, sync, truncate the WAL, record metrics. Any failure
    /// aborts before the WAL is truncated, so the next attempt replays the
    /// same backlog.
    fn checkpoint_inner(&self) -> Result<()> {
        let start = std::time::Instant::now();
        let _write_guard = self.writer_lock.lock();
        let mut store = self.store.lock();
        let now = Timestamp::now();
        store.wal.append_checkpoint(now.as_nanos())?;
        store.wal.sync()?;

        let dirty_ids = self.cache.dirty_ids();
        let mut persisted = 0usize;
        {
            let mut index_map = self.index_map.write();
            for id in &dirty_ids {
                let Some(entity) = self.cache.get(id) else { continue };
                let mut writer = Writer::new(&mut store.euff, self.config.compression_threshold_bytes);
                let entry = writer.append_entity(&entity)?;
                index_map.insert(id.clone(), entry);
                persisted += 1;
            }
        }
        let entity_values: Vec<IndexEntry> = self.index_map.read().values().cloned().collect();
        let deletion_values: Vec<DeletionEntry> = self.deletions.read().values().cloned().collect();

        store.euff.header.wal_size = 0;
        store.euff.header.wal_sequence = store.wal.next_sequence();
        store.euff.write_footer(&entity_values, &deletion_values)?;
        store.euff.sync()?;
        store.wal.truncate()?;
        drop(store);
        drop(_write_guard);

        for id in &dirty_ids {
            self.cache.mark_clean(id);
        }
        self.reader_pool.drain();
        let seq = self.checkpoint.mark_checkpointed();
        self.persist_tag_snapshot();

        let elapsed = start.elapsed();
        metrics::emit(self.metric_sink.as_ref(), "checkpoint.duration_ms", elapsed.as_secs_f64() * 1000.0, "ms", "checkpoint wall time", &Labels::new());
        metrics::emit(self.metric_sink.as_ref(), "checkpoint.entities_persisted", persisted as f64, "count", "entities flushed by checkpoint", &Labels::new());
        tracing::info!(sequence = seq, entities = persisted, elapsed_ms = elapsed.as_millis() as u64, "checkpoint complete");
        Ok(())
    }

    fn persist_tag_snapshot(&self) {
        match self.tag_index.snapshot().to_bytes() {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.snapshot_path, bytes) {
                    tracing::warn!(error = %e, "failed to persist tag index snapshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize tag index snapshot"),
        }
    }

    /// Drain and durably commit any batch-writer-deferred WAL entries.
    pub fn flush(&self) -> Result<usize> {
        let Some(batch) = &self.batch else { return Ok(0) };
        let ops = batch.drain();
        if ops.is_empty() {
            return Ok(0);
        }
        {
            let _write_guard = self.writer_lock.lock();
            let mut store = self.store.lock();
            self.persist_wal_header(&mut store)?;
        }
        self.reader_pool.drain();
        tracing::debug!(count = ops.len(), "batch writer flushed pending WAL entries to disk");
        Ok(ops.len())
    }

    /// Flush pending batched writes, force a final checkpoint, and drop
    /// pooled reader handles.
    pub fn close(&self) -> Result<()> {
        if self.batch.as_ref().is_some_and(|b| !b.is_empty()) {
            self.flush()?;
        }
        self.checkpoint_inner()?;
        self.reader_pool.drain();
        tracing::info!("repository closed");
        Ok(())
    }

    /// Compare the live-id set against the tag index without repairing
    /// anything. Clears emergency mode if the report comes back healthy.
    pub fn check_integrity(&self) -> Result<HealthReport> {
        let ids: Vec<String> = self.live_ids.read().iter().cloned().collect();
        let report = recovery::health_check(&ids, &self.tag_index);
        if report.is_healthy() {
            self.emergency.store(false, Ordering::SeqCst);
        } else {
            tracing::warn!(
                missing = report.missing_from_index.len(),
                extra = report.extra_in_index.len(),
                "integrity check found index/entity-map disagreement"
            );
        }
        Ok(report)
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    // ---- Internal helpers ----------------------------------------------

    fn check_emergency(&self) -> Result<()> {
        if self.emergency.load(Ordering::SeqCst) {
            return Err(Error::integrity(
                "repository is in emergency mode; call check_integrity() before writing again",
            ));
        }
        Ok(())
    }

    fn enter_emergency(&self, reason: &str) {
        if !self.emergency.swap(true, Ordering::SeqCst) {
            tracing::warn!(reason, "entering emergency mode: rejecting further writes until an integrity check passes");
        }
    }

    /// WAL-append, optionally forcing durability (fsync + header persist)
    /// right away. `durable = false` defers that to the batch writer's next
    /// flush — see spec §6's `use_batch_writes`.
    fn append_wal(&self, store: &mut Store, op: OpType, now: Timestamp, id: &str, payload: Option<EntityPayload>, durable: bool) -> Result<()> {
        match store.wal.append(op, now.as_nanos(), id.to_string(), payload) {
            Ok(_) => {}
            Err(e) => {
                if matches!(e, Error::Integrity(_)) {
                    self.enter_emergency(&e.to_string());
                }
                return Err(e);
            }
        }
        if durable {
            self.persist_wal_header(store)?;
        }
        Ok(())
    }

    /// Sync the WAL, then persist the header's `wal_size`/`wal_sequence` so
    /// the next open's replay reads exactly the bytes just written. Cheap:
    /// the header is a fixed 128 bytes.
    fn persist_wal_header(&self, store: &mut Store) -> Result<()> {
        store.wal.sync()?;
        store.euff.header.wal_size = store.wal.size();
        store.euff.header.wal_sequence = store.wal.next_sequence();
        store.euff.write_header()?;
        store.euff.sync()?;
        Ok(())
    }

    fn reindex_entity(&self, entity: &Entity) {
        let id = entity.id.as_str();
        let mut timeline = Vec::with_capacity(entity.tags.len());
        for tag in &entity.tags {
            self.tag_index.add_tag(id, tag);
            self.namespace_index.add_tag(id, tag.body());
            timeline.push(TemporalEntry { timestamp: Timestamp::from_nanos(tag.timestamp_nanos()), body: tag.body().to_string() });
        }
        self.temporal_index.set_timeline(id, timeline);
        if let Some(content) = &entity.content {
            self.content_index.index(id, &String::from_utf8_lossy(content));
        }
    }

    fn deindex_entity(&self, entity: &Entity) {
        self.tag_index.remove_entity(entity.id.as_str(), &entity.tags);
        self.namespace_index.remove_entity(entity.id.as_str());
        self.temporal_index.remove_entity(entity.id.as_str());
        self.content_index.remove(entity.id.as_str());
    }

    /// The authoritative full set of live entities, hydrating from cache or
    /// disk as needed. Used as the input set to a full-file rewrite.
    fn snapshot_all_entities(&self) -> Result<Vec<Entity>> {
        let ids: Vec<String> = self.live_ids.read().iter().cloned().collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get_inner(&id)?);
        }
        Ok(out)
    }
}

fn stamp_tags(raw: Vec<String>, now: Timestamp) -> Result<Vec<Tag>> {
    raw.into_iter()
        .map(|body| {
            if body.is_empty() {
                return Err(Error::validation("tag body must not be empty"));
            }
            Ok(Tag::wrap(body, now.as_nanos()))
        })
        .collect()
}

/// Add a `checksum:sha256:<hex>` tag when content is present and the
/// entity does not already carry one (spec §4.3 step 2).
fn ensure_checksum_tag(tags: &mut Vec<Tag>, content: Option<&[u8]>, now: Timestamp) {
    let Some(content) = content else { return };
    if tags.iter().any(|t| t.body().starts_with("checksum:sha256:")) {
        return;
    }
    tags.push(Tag::wrap(format!("checksum:sha256:{}", sha256_hex(content)), now.as_nanos()));
}

fn validate_checksum(entity: &Entity) -> std::result::Result<(), String> {
    for tag in &entity.tags {
        if let Some(expected) = tag.body().strip_prefix("checksum:sha256:") {
            let Some(content) = &entity.content else { return Ok(()) };
            let actual = sha256_hex(content);
            if actual != expected {
                return Err(format!(
                    "checksum mismatch for {}: expected {expected}, computed {actual}",
                    entity.id.as_str()
                ));
            }
            return Ok(());
        }
    }
    Ok(())
}

fn checksum_bytes(entity: &Entity) -> [u8; 32] {
    for tag in &entity.tags {
        if let Some(hex) = tag.body().strip_prefix("checksum:sha256:") {
            if let Some(bytes) = hex_to_32(hex) {
                return bytes;
            }
        }
    }
    [0u8; 32]
}

fn hex_to_32(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

fn to_payload(entity: &Entity) -> EntityPayload {
    EntityPayload {
        tags: entity.tags.iter().map(|t| t.as_str().to_string()).collect(),
        content: entity.content.clone(),
    }
}

fn snapshot_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".idx");
    PathBuf::from(name)
}

fn try_load_snapshot(db_path: &Path, snapshot_path: &Path) -> Option<TagIndexSnapshot> {
    let data_meta = std::fs::metadata(db_path).ok()?;
    let snapshot_meta = std::fs::metadata(snapshot_path).ok()?;
    let stale = entity_index::snapshot::is_stale(
        data_meta.modified().ok()?,
        snapshot_meta.modified().ok()?,
        data_meta.len(),
        snapshot_meta.len(),
    );
    if stale {
        return None;
    }
    let bytes = std::fs::read(snapshot_path).ok()?;
    TagIndexSnapshot::from_bytes(&bytes).ok()
}
