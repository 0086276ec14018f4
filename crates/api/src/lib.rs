//! Public embedded-operations API for the EUFF entity engine (spec §6).
//!
//! [`Database`] is the facade an embedder actually reaches for — a thin,
//! one-call-per-operation wrapper over `entity_engine::EntityRepository`.
//! [`config::EngineConfig`] layers `serde`/TOML file loading on top of the
//! engine's in-memory `RepositoryConfig`, since constructing a database
//! from a config file is ambient stack even though the *policy* of when
//! to reload one belongs to a larger embedding service (out of scope here).

pub mod config;
pub mod database;

pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use database::{Database, OpenOptions};

pub use entity_core::entity::Entity;
pub use entity_core::entity_id::EntityId;
pub use entity_core::error::{Error, Result};
pub use entity_core::tag::Tag;
pub use entity_core::timestamp::Timestamp;
pub use entity_engine::repository::Change;
pub use entity_engine::{HealthReport, MetricSink, OperationSink};
