//! Repository configuration knobs (spec §6). This is the plain in-memory
//! form; `entity-api::config` layers serde/TOML loading on top for
//! embedders that want a config file.

use std::time::Duration;

/// Thresholds that decide when the checkpoint manager runs.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointThresholds {
    pub ops: u64,
    pub interval: Duration,
    pub wal_bytes: u64,
}

impl Default for CheckpointThresholds {
    fn default() -> Self {
        CheckpointThresholds {
            ops: 1000,
            interval: Duration::from_secs(5 * 60),
            wal_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub database_filename: String,
    pub use_batch_writes: bool,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub use_variant_cache: bool,
    pub entity_cache_size: usize,
    pub content_index_capacity: usize,
    pub checkpoint: CheckpointThresholds,
    pub compression_threshold_bytes: usize,
    pub tag_shard_count: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig {
            database_filename: "entities.edb".to_string(),
            use_batch_writes: true,
            batch_size: 10,
            flush_interval: Duration::from_millis(100),
            use_variant_cache: true,
            entity_cache_size: 10_000,
            content_index_capacity: 10_000,
            checkpoint: CheckpointThresholds::default(),
            compression_threshold_bytes: entity_core::limits::DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            tag_shard_count: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RepositoryConfig::default();
        assert_eq!(config.database_filename, "entities.edb");
        assert!(config.use_batch_writes);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval, Duration::from_millis(100));
        assert_eq!(config.checkpoint.ops, 1000);
        assert_eq!(config.checkpoint.wal_bytes, 100 * 1024 * 1024);
        assert_eq!(config.compression_threshold_bytes, 1024);
    }
}
