//! Domain types, errors and limits shared by every EUFF engine crate.
//!
//! This crate has no I/O — it defines the vocabulary (`EntityId`, `Tag`,
//! `Timestamp`, `Entity`), the unified error type, and the size limits that
//! the rest of the workspace validates against.

pub mod entity;
pub mod entity_id;
pub mod error;
pub mod limits;
pub mod tag;
pub mod timestamp;

pub use entity::Entity;
pub use entity_id::EntityId;
pub use error::{Error, Result};
pub use tag::Tag;
pub use timestamp::Timestamp;
