//! `Database`: the ergonomic embedded-operations facade (spec §6) over
//! [`entity_engine::EntityRepository`]. One call here maps to exactly one
//! repository call — no hidden batching or retry policy lives in this
//! layer, same "desugars to one call" discipline the teacher's facade
//! crate documents for its own two-layer API.

use entity_core::entity::Entity;
use entity_core::error::Result;
use entity_core::timestamp::Timestamp;
use entity_engine::repository::Change;
use entity_engine::{EntityRepository, MetricSink, NoopMetricSink, NoopOperationSink, OperationSink, RepositoryConfig};
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, CONFIG_FILE_NAME};

/// Builder for opening a [`Database`], mirroring the teacher's
/// config-file-in-the-data-directory model: on first open, a default
/// config file is written next to the data file if one is not already
/// there.
pub struct OpenOptions {
    config: EngineConfig,
    metric_sink: Option<Box<dyn MetricSink>>,
    operation_sink: Option<Box<dyn OperationSink>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions { config: EngineConfig::default(), metric_sink: None, operation_sink: None }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config instead of loading/writing `entities.toml`.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Wire the engine up to an async metric-sink hook (spec §6). Tolerated
    /// as absent by default.
    pub fn with_metric_sink(mut self, sink: Box<dyn MetricSink>) -> Self {
        self.metric_sink = Some(sink);
        self
    }

    /// Wire the engine up to an operation-tracking sink (spec §6).
    pub fn with_operation_sink(mut self, sink: Box<dyn OperationSink>) -> Self {
        self.operation_sink = Some(sink);
        self
    }

    /// Open (or create) a database rooted at `dir`. If no `entities.toml`
    /// exists in `dir`, one is written with documented defaults before the
    /// repository starts; an existing one always wins.
    pub fn open(self, dir: impl AsRef<Path>) -> Result<Database> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        let config = if config_path.exists() {
            EngineConfig::load(&config_path)?
        } else {
            self.config.save(&config_path)?;
            self.config.clone()
        };
        let repo_config: RepositoryConfig = config.to_repository_config();
        let data_dir = if config.data_path.is_empty() { dir.clone() } else { PathBuf::from(&config.data_path) };

        let repository = match (self.metric_sink, self.operation_sink) {
            (None, None) => EntityRepository::open(&data_dir, repo_config)?,
            (metric, operation) => EntityRepository::open_with_sinks(
                &data_dir,
                repo_config,
                metric.unwrap_or_else(|| Box::new(NoopMetricSink)),
                operation.unwrap_or_else(|| Box::new(NoopOperationSink)),
            )?,
        };
        Ok(Database { repository, dir })
    }
}

/// The embedded entity database: one EUFF file plus every in-memory
/// structure layered over it (spec §1/§2). This is the surface an
/// embedder reaches for; `entity_engine::EntityRepository` is the
/// orchestrator it wraps one-to-one.
pub struct Database {
    repository: EntityRepository,
    dir: PathBuf,
}

impl Database {
    /// Open (or create) a database rooted at `dir` with default
    /// configuration and no metric/operation sinks.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(dir)
    }

    /// The data directory this database was opened against.
    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new entity. An empty or absent `id` generates a UUID.
    /// Every `tags` entry is stamped with the current time unless already
    /// of temporal form.
    pub fn create(&self, id: Option<String>, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        self.repository.create(id, tags, content)
    }

    /// Fetch an entity by id.
    pub fn get(&self, id: &str) -> Result<Entity> {
        self.repository.get(id)
    }

    /// Replace an entity's tags and content, preserving its id and
    /// creation time.
    pub fn update(&self, id: &str, tags: Vec<String>, content: Option<Vec<u8>>) -> Result<Entity> {
        self.repository.update(id, tags, content)
    }

    /// Delete an entity.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.repository.delete(id)
    }

    /// Append a single temporal tag to an existing entity without a full
    /// rewrite.
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<()> {
        self.repository.add_tag(id, tag)
    }

    /// Remove every current occurrence of a tag body from an entity.
    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<()> {
        self.repository.remove_tag(id, tag)
    }

    /// List entities carrying `tag` (direct or temporal-variant match).
    pub fn list_by_tag(&self, tag: &str) -> Result<Vec<Entity>> {
        self.repository.list_by_tag(tag)
    }

    /// List entities matching `tags`, intersected (`match_all = true`) or
    /// unioned (`match_all = false`).
    pub fn list_by_tags(&self, tags: &[String], match_all: bool) -> Result<Vec<Entity>> {
        self.repository.list_by_tags(tags, match_all)
    }

    /// List entities with at least one tag body matching `pattern`
    /// (a single trailing `*` wildcard, e.g. `content:type:image/*`).
    pub fn list_by_wildcard(&self, pattern: &str) -> Result<Vec<Entity>> {
        self.repository.list_by_wildcard(pattern)
    }

    /// List entities with any tag in the given namespace (the prefix
    /// before the first `:` in a tag body).
    pub fn list_by_namespace(&self, namespace: &str) -> Result<Vec<Entity>> {
        self.repository.list_by_namespace(namespace)
    }

    /// Linear, case-insensitive substring search over indexed content.
    pub fn search_content(&self, substring: &str) -> Result<Vec<Entity>> {
        self.repository.search_content(substring)
    }

    /// The entity's state as of `at`: current content, layered with only
    /// the tags whose timeline places them at or before that time.
    pub fn entity_as_of(&self, id: &str, at: Timestamp) -> Result<Entity> {
        self.repository.entity_as_of(id, at)
    }

    /// An entity's tag timeline, oldest first, truncated to `limit`.
    pub fn entity_history(&self, id: &str, limit: usize) -> Result<Vec<Change>> {
        self.repository.entity_history(id, limit)
    }

    /// Force a checkpoint now, regardless of the configured thresholds.
    pub fn checkpoint(&self) -> Result<()> {
        self.repository.checkpoint()
    }

    /// Drain any batch-writer-deferred WAL entries to disk immediately.
    pub fn flush(&self) -> Result<usize> {
        self.repository.flush()
    }

    /// Flush pending batched writes, force a final checkpoint, and drop
    /// pooled reader handles.
    pub fn close(&self) -> Result<()> {
        self.repository.close()
    }

    /// Compare the live-id set against the tag index without repairing
    /// anything, clearing emergency mode if the report comes back healthy.
    pub fn check_integrity(&self) -> Result<entity_engine::HealthReport> {
        self.repository.check_integrity()
    }

    /// Whether the database is currently refusing writes pending an
    /// integrity check (spec §4.2's emergency mode).
    pub fn is_emergency(&self) -> bool {
        self.repository.is_emergency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_writes_default_config_on_first_use() {
        let dir = tempdir().unwrap();
        let _db = Database::open(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn open_reuses_an_existing_config_file() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.batch_size = 42;
        config.save(dir.path().join(CONFIG_FILE_NAME)).unwrap();

        let _db = Database::open(dir.path()).unwrap();
        let reloaded = EngineConfig::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(reloaded.batch_size, 42);
    }

    #[test]
    fn create_get_update_delete_round_trip() {
        let dir = tempdir().unwrap();
        let db = OpenOptions::new()
            .with_config(EngineConfig { use_batch_writes: false, ..EngineConfig::default() })
            .open(dir.path())
            .unwrap();

        let created = db.create(Some("e1".to_string()), vec!["type:user".to_string()], Some(b"hi".to_vec())).unwrap();
        assert_eq!(created.id.as_str(), "e1");

        let fetched = db.get("e1").unwrap();
        assert_eq!(fetched.content, Some(b"hi".to_vec()));

        let updated = db.update("e1", vec!["type:admin".to_string()], None).unwrap();
        assert_eq!(updated.created_at, created.created_at);

        db.delete("e1").unwrap();
        assert!(db.get("e1").is_err());
    }

    #[test]
    fn list_and_temporal_queries_delegate_to_the_repository() {
        let dir = tempdir().unwrap();
        let db = OpenOptions::new()
            .with_config(EngineConfig { use_batch_writes: false, ..EngineConfig::default() })
            .open(dir.path())
            .unwrap();

        db.create(Some("e1".to_string()), vec!["type:doc".to_string()], None).unwrap();
        db.add_tag("e1", "status:active").unwrap();

        assert_eq!(db.list_by_tag("status:active").unwrap().len(), 1);
        assert_eq!(db.list_by_namespace("type").unwrap().len(), 1);
        assert_eq!(db.list_by_tags(&["type:doc".to_string(), "status:active".to_string()], true).unwrap().len(), 1);
        assert_eq!(db.entity_history("e1", 10).unwrap().len(), 2);

        let report = db.check_integrity().unwrap();
        assert!(report.is_healthy());
        assert!(!db.is_emergency());
    }

    #[test]
    fn checkpoint_and_close_do_not_error_on_an_empty_database() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        db.checkpoint().unwrap();
        db.close().unwrap();
    }
}
