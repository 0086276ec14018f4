//! EUFF: an embedded temporal entity database with a single-file binary
//! format, a write-ahead log, and in-memory auxiliary indexes.
//!
//! This root crate is a thin re-export of the public surface; the actual
//! implementation lives across the workspace:
//!
//! - [`entity_core`] — domain types, the unified error type, size limits.
//! - [`entity_format`] — the EUFF binary codec.
//! - [`entity_wal`] — the embedded write-ahead log.
//! - [`entity_index`] — sharded tag index, temporal index, namespace index.
//! - [`entity_engine`] — the entity repository orchestrator, checkpointing,
//!   batching, recovery.
//! - [`entity_api`] — [`Database`], the ergonomic embedded-operations facade.
//!
//! Most embedders only need [`Database`] and [`EngineConfig`], re-exported
//! at the crate root.

pub use entity_api::{config, database, Database, EngineConfig, OpenOptions, CONFIG_FILE_NAME};
pub use entity_core::{entity, entity_id, error, tag, timestamp};
pub use entity_core::{Entity, EntityId, Error, Result, Tag, Timestamp};

pub use entity_api as api;
pub use entity_core as core;
pub use entity_engine as engine;
pub use entity_format as format;
pub use entity_index as index;
pub use entity_wal as wal;
