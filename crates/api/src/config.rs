//! `entities.toml`-style configuration: every knob enumerated in spec §6,
//! loadable from (and writable to) a TOML file, same pattern the engine
//! crate's `RepositoryConfig` models in memory — this layer just adds
//! serde and file I/O on top, since loading a config file is ambient
//! stack the embedder needs even though *policy* for when to reload one
//! is out of scope here.

use entity_core::error::{Error, Result};
use entity_engine::config::{CheckpointThresholds, RepositoryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "entities.toml";

/// Serde-deserializable mirror of [`RepositoryConfig`], the on-disk
/// config-file shape. Every field carries the default documented in
/// spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the data file and its sidecar files. Empty means
    /// "the directory the config file lives in", resolved by the caller.
    pub data_path: String,
    pub database_filename: String,
    pub use_batch_writes: bool,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub use_variant_cache: bool,
    pub entity_cache_size: usize,
    pub content_index_capacity: usize,
    pub checkpoint_ops_threshold: u64,
    pub checkpoint_interval_secs: u64,
    pub checkpoint_wal_bytes: u64,
    pub compression_threshold_bytes: usize,
    pub tag_shard_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let repo_defaults = RepositoryConfig::default();
        let checkpoint_defaults = CheckpointThresholds::default();
        EngineConfig {
            data_path: String::new(),
            database_filename: repo_defaults.database_filename,
            use_batch_writes: repo_defaults.use_batch_writes,
            batch_size: repo_defaults.batch_size,
            flush_interval_ms: repo_defaults.flush_interval.as_millis() as u64,
            use_variant_cache: repo_defaults.use_variant_cache,
            entity_cache_size: repo_defaults.entity_cache_size,
            content_index_capacity: repo_defaults.content_index_capacity,
            checkpoint_ops_threshold: checkpoint_defaults.ops,
            checkpoint_interval_secs: checkpoint_defaults.interval.as_secs(),
            checkpoint_wal_bytes: checkpoint_defaults.wal_bytes,
            compression_threshold_bytes: repo_defaults.compression_threshold_bytes,
            tag_shard_count: repo_defaults.tag_shard_count,
        }
    }
}

impl EngineConfig {
    /// Translate into the in-memory form the engine crate actually consumes.
    pub fn to_repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            database_filename: self.database_filename.clone(),
            use_batch_writes: self.use_batch_writes,
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            use_variant_cache: self.use_variant_cache,
            entity_cache_size: self.entity_cache_size,
            content_index_capacity: self.content_index_capacity,
            checkpoint: CheckpointThresholds {
                ops: self.checkpoint_ops_threshold,
                interval: Duration::from_secs(self.checkpoint_interval_secs),
                wal_bytes: self.checkpoint_wal_bytes,
            },
            compression_threshold_bytes: self.compression_threshold_bytes,
            tag_shard_count: self.tag_shard_count,
        }
    }

    /// The default config file content, with comments documenting each
    /// knob's default (mirroring the teacher's `default_toml`).
    pub fn default_toml() -> &'static str {
        r#"# EUFF entity database configuration
#
# data_path: directory holding the data file and its sidecar files.
# Left empty to default to the directory this config file lives in.
data_path = ""

# Name of the unified data file within data_path.
database_filename = "entities.edb"

# Batch writer: coalesce create/update/add_tag into grouped flushes.
use_batch_writes = true
batch_size = 10
flush_interval_ms = 100

# Tag-variant cache: precomputed clean-tag -> entities mapping.
use_variant_cache = true

# In-memory entity cache capacity (entries).
entity_cache_size = 10000

# In-memory content-index capacity (entries, oldest evicted past this).
content_index_capacity = 10000

# Checkpoint triggers: whichever threshold is hit first wins.
checkpoint_ops_threshold = 1000
checkpoint_interval_secs = 300
checkpoint_wal_bytes = 104857600

# Content smaller than this is always stored raw, regardless of whether
# gzip would shrink it.
compression_threshold_bytes = 1024

# Number of independent locked shards backing the in-memory tag index.
tag_shard_count = 64
"#
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::validation(format!("invalid config: {e}")))
    }

    /// Read and parse config from a file path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML and write it to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::validation(format!("failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Write the default config file if one does not already exist at `path`.
    pub fn write_default_if_missing(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_matches_documented_spec_values() {
        let config = EngineConfig::default();
        assert_eq!(config.database_filename, "entities.edb");
        assert!(config.use_batch_writes);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval_ms, 100);
        assert_eq!(config.checkpoint_ops_threshold, 1000);
        assert_eq!(config.checkpoint_interval_secs, 300);
        assert_eq!(config.checkpoint_wal_bytes, 100 * 1024 * 1024);
        assert_eq!(config.compression_threshold_bytes, 1024);
    }

    #[test]
    fn default_toml_parses_back_to_defaults() {
        let parsed = EngineConfig::from_toml_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn empty_toml_uses_all_defaults() {
        let parsed = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let parsed = EngineConfig::from_toml_str("batch_size = 50\n").unwrap();
        assert_eq!(parsed.batch_size, 50);
        assert_eq!(parsed.database_filename, "entities.edb");
    }

    #[test]
    fn write_default_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());
        EngineConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "batch_size = 99\n").unwrap();
        EngineConfig::write_default_if_missing(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.batch_size, 99);
    }

    #[test]
    fn save_then_load_round_trips_custom_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = EngineConfig::default();
        config.batch_size = 25;
        config.use_batch_writes = false;
        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn to_repository_config_maps_every_field() {
        let config = EngineConfig::default();
        let repo = config.to_repository_config();
        assert_eq!(repo.database_filename, config.database_filename);
        assert_eq!(repo.batch_size, config.batch_size);
        assert_eq!(repo.flush_interval, Duration::from_millis(config.flush_interval_ms));
        assert_eq!(repo.checkpoint.ops, config.checkpoint_ops_threshold);
        assert_eq!(repo.checkpoint.wal_bytes, config.checkpoint_wal_bytes);
        assert_eq!(repo.tag_shard_count, config.tag_shard_count);
    }
}
